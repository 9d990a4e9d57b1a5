// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `hidring simulate` command - Play the driver side against a real ring.
//!
//! Creates the named ring, writes a mix of report, connection and info
//! records, then either reads them back in-process or holds the ring open
//! so `hidring dump` can attach from another terminal.

use hidring_core::{
    ConfigLoader, EventKind, MonotonicClock, ReportLayout, RingBuffer, RingProducer,
    SharedMemoryError, TickSource,
};

use crate::output::EventPrinter;

/// Report bytes appended after the layout's fixed prefix.
const REPORT_BYTES: usize = 8;

/// One synthetic record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SyntheticRecord {
    kind: EventKind,
    payload: Vec<u8>,
    backdated: bool,
}

fn device_address(seq: u32) -> [u8; 6] {
    let [_, _, hi, lo] = seq.to_be_bytes();
    [0x98, 0xB6, 0xE9, 0x00, hi, lo]
}

/// Build record `seq`. Every third record is a report response; every
/// `stale_every`th of those is flagged for back-dating.
fn synthesize(seq: u32, layout: ReportLayout, stale_every: u32) -> SyntheticRecord {
    let address = device_address(seq);
    match seq % 3 {
        0 => {
            let report_index = seq / 3;
            let mut payload = vec![0u8; layout.report_offset() + REPORT_BYTES];
            let at = layout.address_offset();
            payload[at..at + address.len()].copy_from_slice(&address);
            for (i, byte) in payload[layout.report_offset()..].iter_mut().enumerate() {
                *byte = (seq as u8).wrapping_add(i as u8);
            }
            SyntheticRecord {
                kind: EventKind::GetReport,
                payload,
                backdated: stale_every > 0 && report_index % stale_every == stale_every - 1,
            }
        }
        1 => {
            let mut payload = address.to_vec();
            payload.extend_from_slice(&[0, 0]);
            // Alternate connected / disconnected.
            payload.extend_from_slice(&((seq / 3) % 2 * 2).to_ne_bytes());
            SyntheticRecord {
                kind: EventKind::ConnectionState,
                payload,
                backdated: false,
            }
        }
        _ => SyntheticRecord {
            kind: EventKind::HidInfo,
            payload: seq.to_le_bytes().repeat(4),
            backdated: false,
        },
    }
}

pub async fn execute(
    config_path: &str,
    records: u32,
    stale_every: u32,
    hold: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;
    let layout = config.reader.layout;
    let max_payload = config.reader.max_payload;

    let ring = RingBuffer::create_shared(&config.ring.name, config.ring.geometry)?;
    tracing::info!(
        name = %config.ring.name,
        capacity = ring.capacity(),
        records = records,
        layout = %layout,
        "Created ring"
    );

    let clock = MonotonicClock;
    let stale_age = clock.duration_to_ticks(config.reader.staleness_window * 2);
    let producer = RingProducer::new(&ring, &clock);
    let mut reader = config.reader.build(MonotonicClock);
    let mut printer = EventPrinter::new(false);
    let mut backdated = 0u32;

    for seq in 0..records {
        let record = synthesize(seq, layout, stale_every);
        let now = clock.now();
        let timestamp = if record.backdated {
            backdated += 1;
            now.saturating_sub(stale_age)
        } else {
            now
        };

        match producer.write_with_timestamp(record.kind, timestamp, &record.payload) {
            Ok(()) => {}
            Err(SharedMemoryError::RingBufferFull { writable, .. }) if !hold => {
                tracing::debug!(seq = seq, writable = writable, "Ring full, draining");
                printer.pump(&mut reader, &ring, max_payload)?;
                producer.write_with_timestamp(record.kind, timestamp, &record.payload)?;
            }
            Err(SharedMemoryError::RingBufferFull { .. }) => {
                tracing::warn!(written = seq, "Ring full, stopping early");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if hold {
        println!(
            "Ring '{}' holds {} bytes of records ({} back-dated reports).",
            config.ring.name,
            ring.capacity() - 1 - ring.writable_size(),
            backdated
        );
        println!("Attach with `hidring -c {} dump`; Ctrl+C to release.", config_path);
        tokio::signal::ctrl_c().await?;
        return Ok(());
    }

    printer.pump(&mut reader, &ring, max_payload)?;

    let stats = reader.stats();
    println!();
    println!(
        "Wrote {} records, printed {}, back-dated {}.",
        records,
        printer.printed(),
        backdated
    );
    printer.print_stats(&stats)?;

    if stats.stale_discarded != backdated as u64 {
        tracing::warn!(
            expected = backdated,
            discarded = stats.stale_discarded,
            "Stale discard count differs from back-dated records"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_mix() {
        let kinds: Vec<EventKind> = (0..6)
            .map(|seq| synthesize(seq, ReportLayout::Compact, 0).kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::GetReport,
                EventKind::ConnectionState,
                EventKind::HidInfo,
                EventKind::GetReport,
                EventKind::ConnectionState,
                EventKind::HidInfo,
            ]
        );
    }

    #[test]
    fn test_report_payload_follows_layout() {
        for layout in [ReportLayout::Compact, ReportLayout::Legacy, ReportLayout::V2] {
            let record = synthesize(3, layout, 0);
            let event = layout.decode_report(&record.payload, 64).unwrap();
            assert_eq!(event.address.as_bytes(), &device_address(3));
            assert_eq!(event.report.len(), REPORT_BYTES);
        }
    }

    #[test]
    fn test_backdating_cadence() {
        let flagged: Vec<u32> = (0..30)
            .filter(|&seq| synthesize(seq, ReportLayout::Compact, 2).backdated)
            .collect();
        // Reports are seq 0, 3, 6, ...; every second one is back-dated.
        assert_eq!(flagged, vec![3, 9, 15, 21, 27]);

        assert!((0..30).all(|seq| !synthesize(seq, ReportLayout::Compact, 0).backdated));
    }

    #[test]
    fn test_connection_payload_decodes() {
        let record = synthesize(1, ReportLayout::Compact, 0);
        let event = hidring_core::ConnectionStateEvent::decode(&record.payload, 64).unwrap();
        assert_eq!(event.state, hidring_core::HidConnectionState::Connected);
    }
}
