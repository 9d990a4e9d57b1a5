// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `hidring dump` command - Attach to a live ring and print its events.

use hidring_core::{ConfigLoader, MonotonicClock, RingBuffer};

use crate::output::EventPrinter;

pub async fn execute(config_path: &str, follow: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;

    let ring = RingBuffer::open_shared(&config.ring.name, config.ring.geometry)?;
    if !ring.is_initialized() {
        tracing::warn!(name = %config.ring.name, "Ring exists but the producer has not initialized it yet");
    }

    tracing::info!(
        name = %config.ring.name,
        capacity = ring.capacity(),
        layout = %config.reader.layout,
        follow = follow,
        "Attached to ring"
    );

    let mut reader = config.reader.build(MonotonicClock);
    let mut printer = EventPrinter::new(json);
    let max_payload = config.reader.max_payload;

    if !follow {
        printer.pump(&mut reader, &ring, max_payload)?;
        return printer.print_stats(&reader.stats());
    }

    let mut ticker = tokio::time::interval(config.reader.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let printed = printer.pump(&mut reader, &ring, max_payload)?;
                if printed > 0 {
                    tracing::debug!(printed = printed, "Drained ring");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, detaching from ring");
                break;
            }
        }
    }

    printer.print_stats(&reader.stats())
}
