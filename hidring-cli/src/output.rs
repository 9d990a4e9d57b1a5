// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Event and statistics printing shared by `dump` and `simulate`.

use std::io::Write;

use hidring_core::{DecodedEvent, EventPoll, EventReader, ReaderStats, RingBuffer, TickSource};

/// Prints events as text or JSON lines.
pub struct EventPrinter {
    json: bool,
    printed: u64,
}

impl EventPrinter {
    pub fn new(json: bool) -> Self {
        Self { json, printed: 0 }
    }

    pub fn printed(&self) -> u64 {
        self.printed
    }

    pub fn print(&mut self, event: &DecodedEvent) -> Result<(), Box<dyn std::error::Error>> {
        let mut out = std::io::stdout().lock();
        if self.json {
            serde_json::to_writer(&mut out, event)?;
            writeln!(out)?;
        } else {
            writeln!(out, "[{:>6}] {}", self.printed, event)?;
        }
        self.printed += 1;
        Ok(())
    }

    /// Print everything currently readable.
    ///
    /// Undecodable records are logged and skipped; any other error means
    /// the ring can no longer be trusted and is returned.
    pub fn pump<C: TickSource>(
        &mut self,
        reader: &mut EventReader<C>,
        ring: &RingBuffer,
        max_payload: usize,
    ) -> Result<u64, Box<dyn std::error::Error>> {
        let before = self.printed;
        loop {
            match reader.next_event(ring, max_payload) {
                Ok(EventPoll::Ready(event)) => self.print(&event)?,
                Ok(EventPoll::Empty) => break,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "Skipping record");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(self.printed - before)
    }

    pub fn print_stats(&self, stats: &ReaderStats) -> Result<(), Box<dyn std::error::Error>> {
        if self.json {
            eprintln!("{}", serde_json::to_string(stats)?);
        } else {
            eprintln!();
            eprintln!("Reader Statistics:");
            eprintln!("  Delivered:        {}", stats.delivered);
            eprintln!("  Stale Discarded:  {}", stats.stale_discarded);
            eprintln!("  Skip Markers:     {}", stats.skip_markers);
            eprintln!("  Decode Failures:  {}", stats.decode_failures);
        }
        Ok(())
    }
}
