// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared fixtures for the hidring benchmarks.
//!
//! Builds heap-backed rings pre-filled with records so each benchmark
//! measures the reader alone.

use hidring_core::{
    EventKind, HeaderFormat, HidRingResult, ManualClock, RingBuffer, RingGeometry, RingName,
    RingProducer,
};

/// Clock origin used by every fixture.
pub const FIXTURE_NOW: u64 = 1_000_000_000_000;

/// Initialized, empty in-memory ring.
pub fn fixture_ring(capacity: u32, format: HeaderFormat) -> HidRingResult<RingBuffer> {
    let geometry = RingGeometry::new(capacity, format)?;
    let ring = RingBuffer::in_memory(geometry)?;
    ring.initialize(&RingName::new("bench")?)?;
    Ok(ring)
}

/// Compact-layout report payload carrying `report_len` report bytes.
pub fn report_payload(report_len: usize) -> Vec<u8> {
    let mut payload = vec![0xDC, 0x68, 0xEB, 0x11, 0x22, 0x33, 0, 0];
    payload.resize(8 + report_len, 0xAB);
    payload
}

/// Write `count` report records aged `age_ticks` behind [`FIXTURE_NOW`].
///
/// Stops early when the ring fills up and returns how many were written.
pub fn fill_reports(ring: &RingBuffer, count: usize, report_len: usize, age_ticks: u64) -> usize {
    let producer = RingProducer::new(ring, ManualClock::new(FIXTURE_NOW));
    let payload = report_payload(report_len);
    (0..count)
        .take_while(|_| {
            producer
                .write_with_timestamp(EventKind::GetReport, FIXTURE_NOW - age_ticks, &payload)
                .is_ok()
        })
        .count()
}
