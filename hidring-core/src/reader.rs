// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Event record reader.
//!
//! Drains framed records from a [`RingBuffer`], discarding late report
//! responses and decoding everything else into [`DecodedEvent`]s.
//!
//! Per call the reader walks `Scanning → Found → (Fresh | Stale)`. Stale
//! report records and producer skip markers are freed and the scan
//! continues; a fresh record is copied out, freed, then decoded.
//! A framing error ends the call immediately and is never retried.

use std::time::Duration;

use serde::Serialize;

use crate::clock::{MonotonicClock, TickSource};
use crate::error::{FramingError, HidRingError, HidRingResult};
use crate::event::{ConnectionStateEvent, DecodedEvent};
use crate::layout::ReportLayout;
use crate::shm::{EventKind, RecordHeader, RingBuffer};

/// Age past which a queued report response is dropped.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_millis(100);

/// Outcome of a successful poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPoll {
    /// Nothing to deliver right now. Check back later.
    Empty,
    Ready(DecodedEvent),
}

impl EventPoll {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn into_event(self) -> Option<DecodedEvent> {
        match self {
            Self::Empty => None,
            Self::Ready(event) => Some(event),
        }
    }
}

/// Running counters for one reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReaderStats {
    pub delivered: u64,
    pub stale_discarded: u64,
    pub skip_markers: u64,
    pub decode_failures: u64,
}

/// Consumer for a ring buffer.
///
/// Holds no reference to the ring; the handle is passed into every call.
#[derive(Debug)]
pub struct EventReader<C: TickSource = MonotonicClock> {
    clock: C,
    layout: ReportLayout,
    staleness_window: Duration,
    stats: ReaderStats,
}

impl EventReader<MonotonicClock> {
    /// Reader on the system monotonic clock.
    pub fn new(layout: ReportLayout) -> Self {
        Self::with_clock(MonotonicClock, layout)
    }
}

impl<C: TickSource> EventReader<C> {
    pub fn with_clock(clock: C, layout: ReportLayout) -> Self {
        Self {
            clock,
            layout,
            staleness_window: DEFAULT_STALENESS_WINDOW,
            stats: ReaderStats::default(),
        }
    }

    /// Override the staleness window.
    pub fn staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn layout(&self) -> ReportLayout {
        self.layout
    }

    pub fn window(&self) -> Duration {
        self.staleness_window
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Whether a record should be discarded instead of delivered.
    ///
    /// Only report responses age out. A timestamp ahead of the local clock
    /// counts as fresh.
    pub fn is_stale(&self, header: &RecordHeader) -> bool {
        if header.kind != EventKind::GetReport {
            return false;
        }
        let elapsed = self.clock.now().saturating_sub(header.timestamp);
        self.clock.ticks_to_duration(elapsed) > self.staleness_window
    }

    /// Fetch the next deliverable event.
    ///
    /// `max_payload` is the size of the caller's destination buffer.
    pub fn next_event(&mut self, ring: &RingBuffer, max_payload: usize) -> HidRingResult<EventPoll> {
        if !ring.is_initialized() {
            tracing::trace!("Ring not initialized yet");
            return Ok(EventPoll::Empty);
        }

        // Only records published before this call are scanned; anything the
        // producer appends meanwhile is left for the next call.
        let (start, write) = ring.offsets().map_err(|e| corrupt(ring, e))?;
        let occupancy = u64::from(if start <= write {
            write - start
        } else {
            ring.capacity() - start + write
        });
        let mut consumed = 0u64;

        while consumed < occupancy {
            let (read, _) = ring.offsets().map_err(|e| corrupt(ring, e))?;
            let Some(header) = ring.peek_record_at(read).map_err(|e| corrupt(ring, e))? else {
                return Ok(EventPoll::Empty);
            };
            let span = ring
                .validate_record(read, &header)
                .map_err(|e| corrupt(ring, e))?;

            if header.kind == EventKind::Skip {
                ring.advance_read_offset(span as u64)
                    .map_err(|e| corrupt(ring, e))?;
                consumed += span as u64;
                self.stats.skip_markers += 1;
                tracing::trace!(offset = read, span = span, "Skipped padding record");
                continue;
            }

            if self.is_stale(&header) {
                ring.advance_read_offset(span as u64)
                    .map_err(|e| corrupt(ring, e))?;
                consumed += span as u64;
                self.stats.stale_discarded += 1;
                tracing::debug!(
                    offset = read,
                    timestamp = header.timestamp,
                    window_ms = self.staleness_window.as_millis() as u64,
                    "Discarded stale report record"
                );
                continue;
            }

            let mut payload = vec![0u8; header.size as usize];
            ring.copy_out(read + ring.geometry().header_size(), &mut payload);
            ring.advance_read_offset(span as u64)
                .map_err(|e| corrupt(ring, e))?;

            tracing::trace!(offset = read, kind = %header.kind, size = header.size, "Read record");

            return match self.decode(header.kind, &payload, max_payload) {
                Ok(event) => {
                    self.stats.delivered += 1;
                    Ok(EventPoll::Ready(event))
                }
                Err(err) => {
                    self.stats.decode_failures += 1;
                    tracing::warn!(offset = read, kind = %header.kind, error = %err, "Dropped undecodable record");
                    Err(err)
                }
            };
        }

        tracing::trace!(consumed = consumed, "Scanned everything published at call start");
        Ok(EventPoll::Empty)
    }

    /// Read until the ring is empty.
    pub fn drain(&mut self, ring: &RingBuffer, max_payload: usize) -> HidRingResult<Vec<DecodedEvent>> {
        let mut events = Vec::new();
        while let EventPoll::Ready(event) = self.next_event(ring, max_payload)? {
            events.push(event);
        }
        Ok(events)
    }

    fn decode(&self, kind: EventKind, payload: &[u8], max_payload: usize) -> HidRingResult<DecodedEvent> {
        let event = match kind {
            EventKind::ConnectionState => {
                DecodedEvent::ConnectionState(ConnectionStateEvent::decode(payload, max_payload)?)
            }
            EventKind::GetReport => {
                DecodedEvent::GetReport(self.layout.decode_report(payload, max_payload)?)
            }
            other => self.layout.decode_passthrough(other, payload, max_payload),
        };
        Ok(event)
    }
}

fn corrupt(ring: &RingBuffer, err: FramingError) -> HidRingError {
    tracing::error!(
        name = %ring.name(),
        read_offset = ring.read_offset(),
        write_offset = ring.write_offset(),
        error = %err,
        "Ring framing corrupted"
    );
    err.into()
}
