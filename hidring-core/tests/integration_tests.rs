// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end integration tests for hidring.
//!
//! These tests drive a producer and a reader against the same ring and
//! check the observable cursor movement and event stream.

use std::ptr::NonNull;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hidring_core::shm::CONTROL_SIZE;
use hidring_core::{
    BluetoothAddress, DecodedEvent, EventKind, EventPoll, EventReader, FramingError,
    HeaderFormat, HidRingError, ManualClock, RecordHeader, ReportLayout, RingBuffer,
    RingGeometry, RingName, RingProducer,
};

const NOW: u64 = 50_000_000_000;
const MS: u64 = 1_000_000;
const MAX_PAYLOAD: usize = 0x2C8;

fn ring(capacity: u32, format: HeaderFormat) -> RingBuffer {
    let geometry = RingGeometry::new(capacity, format).expect("valid geometry");
    let ring = RingBuffer::in_memory(geometry).expect("Failed to allocate ring");
    ring.initialize(&RingName::new("itest").unwrap()).unwrap();
    ring
}

fn report_payload(tag: u8) -> Vec<u8> {
    vec![tag, 0x68, 0xEB, 0x11, 0x22, 0x33, 0, 0]
}

/// Ring over caller-owned memory so tests can plant arbitrary bytes.
struct RawRing {
    ring: RingBuffer,
    mem: Vec<u64>,
}

impl RawRing {
    fn new(capacity: u32) -> Self {
        let geometry = RingGeometry::new(capacity, HeaderFormat::Packed).unwrap();
        let mut mem = vec![0u64; geometry.region_size().div_ceil(8)];
        let base = NonNull::new(mem.as_mut_ptr() as *mut u8).unwrap();
        // SAFETY: `mem` is 8-byte aligned and is dropped after `ring`.
        let ring = unsafe { RingBuffer::attach_raw(base, mem.len() * 8, geometry) }.unwrap();
        ring.initialize(&RingName::new("raw").unwrap()).unwrap();
        Self { ring, mem }
    }

    fn plant(&mut self, offset: u32, bytes: &[u8]) {
        let base = self.mem.as_mut_ptr() as *mut u8;
        // SAFETY: callers stay within the data area
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                base.add(CONTROL_SIZE + offset as usize),
                bytes.len(),
            );
        }
    }
}

/// Test draining N records returns them in write order, then Empty
#[test]
fn test_drain_preserves_write_order() {
    let ring = ring(4096, HeaderFormat::Packed);
    let clock = ManualClock::new(NOW);
    let producer = RingProducer::new(&ring, &clock);

    for i in 0..20u8 {
        if i % 3 == 0 {
            producer.write(EventKind::GetReport, &report_payload(i)).unwrap();
        } else {
            producer.write(EventKind::HidInfo, &[i; 10]).unwrap();
        }
    }

    let mut reader = EventReader::with_clock(&clock, ReportLayout::Compact);
    let events = reader.drain(&ring, MAX_PAYLOAD).unwrap();
    assert_eq!(events.len(), 20);

    for (i, event) in events.iter().enumerate() {
        match event {
            DecodedEvent::GetReport(report) => {
                assert_eq!(i % 3, 0);
                assert_eq!(report.address.as_bytes()[0], i as u8);
            }
            DecodedEvent::Passthrough { kind, payload } => {
                assert_eq!(*kind, EventKind::HidInfo);
                assert_eq!(payload, &vec![i as u8; 10]);
            }
            other => panic!("unexpected event {other}"),
        }
    }

    assert_eq!(reader.next_event(&ring, MAX_PAYLOAD).unwrap(), EventPoll::Empty);
    assert!(ring.is_empty());
}

/// Test stale report records are never returned but the cursor moves past them
#[test]
fn test_stale_reports_never_delivered() {
    let ring = ring(4096, HeaderFormat::Packed);
    let clock = ManualClock::new(NOW);
    let producer = RingProducer::new(&ring, &clock);

    let ages = [0u64, 150, 50, 101, 100, 500];
    for (i, age) in ages.iter().enumerate() {
        producer
            .write_with_timestamp(EventKind::GetReport, NOW - age * MS, &report_payload(i as u8))
            .unwrap();
    }

    let mut reader = EventReader::with_clock(&clock, ReportLayout::Compact);
    let events = reader.drain(&ring, MAX_PAYLOAD).unwrap();

    let delivered: Vec<u8> = events
        .iter()
        .map(|event| match event {
            DecodedEvent::GetReport(report) => report.address.as_bytes()[0],
            other => panic!("unexpected event {other}"),
        })
        .collect();
    assert_eq!(delivered, vec![0, 2, 4]);
    assert_eq!(reader.stats().stale_discarded, 3);
    assert!(ring.is_empty());
}

/// Test non-report kinds are delivered regardless of age
#[test]
fn test_old_non_report_records_delivered() {
    let ring = ring(1024, HeaderFormat::Packed);
    let clock = ManualClock::new(NOW);
    let producer = RingProducer::new(&ring, &clock);

    let mut state = vec![1, 2, 3, 4, 5, 6, 0, 0];
    state.extend_from_slice(&2u32.to_ne_bytes());
    producer
        .write_with_timestamp(EventKind::ConnectionState, 0, &state)
        .unwrap();
    producer
        .write_with_timestamp(EventKind::Handshake, NOW - 10_000 * MS, &[7; 4])
        .unwrap();

    let mut reader = EventReader::with_clock(&clock, ReportLayout::Compact);
    let events = reader.drain(&ring, MAX_PAYLOAD).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind(), EventKind::ConnectionState);
    assert_eq!(events[1].kind(), EventKind::Handshake);
}

/// Test free then next_event never yields the freed record
#[test]
fn test_free_consumes_exactly_one_record() {
    let ring = ring(1024, HeaderFormat::Packed);
    let clock = ManualClock::new(NOW);
    let producer = RingProducer::new(&ring, &clock);
    producer.write(EventKind::HidInfo, &[1; 3]).unwrap();
    producer.write(EventKind::HidInfo, &[2; 3]).unwrap();

    ring.free().unwrap();

    let mut reader = EventReader::with_clock(&clock, ReportLayout::Compact);
    let event = reader.next_event(&ring, MAX_PAYLOAD).unwrap().into_event().unwrap();
    assert_eq!(
        event,
        DecodedEvent::Passthrough {
            kind: EventKind::HidInfo,
            payload: vec![2; 3],
        }
    );

    // Freeing an empty ring is a no-op.
    ring.free().unwrap();
    assert!(reader.next_event(&ring, MAX_PAYLOAD).unwrap().is_empty());
}

/// Test report payload bytes survive the ring untouched
#[test]
fn test_report_bytes_identical() {
    let ring = ring(1024, HeaderFormat::Native);
    let clock = ManualClock::new(NOW);

    let mut payload = vec![0u8; 5];
    payload.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    payload.push(0);
    payload.extend((0u8..=63).collect::<Vec<_>>());

    RingProducer::new(&ring, &clock)
        .write(EventKind::GetReport, &payload)
        .unwrap();

    let mut reader = EventReader::with_clock(&clock, ReportLayout::V2);
    let Some(DecodedEvent::GetReport(report)) =
        reader.next_event(&ring, MAX_PAYLOAD).unwrap().into_event()
    else {
        panic!("expected a report");
    };
    assert_eq!(
        report.address,
        BluetoothAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])
    );
    assert_eq!(report.report, payload[12..].to_vec());
    assert_eq!(report.report_length as usize, payload.len());
    assert_eq!(ring.read_offset(), 24 + payload.len() as u32);
}

/// Test a record ending exactly at capacity wraps the cursor to 0
#[test]
fn test_exact_end_wraps_to_zero() {
    let ring = ring(64, HeaderFormat::Packed);
    ring.force_offsets(30, 30);
    let clock = ManualClock::new(NOW);
    RingProducer::new(&ring, &clock)
        .write(EventKind::HidInfo, &[9; 17])
        .unwrap();
    assert_eq!(ring.write_offset(), 0);

    let mut reader = EventReader::with_clock(&clock, ReportLayout::Compact);
    reader.next_event(&ring, MAX_PAYLOAD).unwrap().into_event().unwrap();
    assert_eq!(ring.read_offset(), 0);
    assert!(ring.is_empty());
}

/// Test a record claiming to run past capacity is a framing error
#[test]
fn test_overrunning_record_is_framing_error() {
    let mut raw = RawRing::new(64);
    let header = RecordHeader::new(EventKind::HidInfo, NOW, 20);
    raw.plant(40, &header.encode(HeaderFormat::Packed));
    raw.ring.force_offsets(40, 10);

    let mut reader = EventReader::with_clock(ManualClock::new(NOW), ReportLayout::Compact);
    let err = reader.next_event(&raw.ring, MAX_PAYLOAD).unwrap_err();
    assert!(matches!(
        err,
        HidRingError::Framing(FramingError::AdvanceOverrun { offset: 40, .. })
    ));
    assert!(!err.is_recoverable());
    assert_eq!(raw.ring.read_offset(), 40);

    // Retrying does not move the cursor either.
    assert!(reader.next_event(&raw.ring, MAX_PAYLOAD).is_err());
    assert_eq!(raw.ring.read_offset(), 40);
    assert!(raw.ring.free().is_err());
    assert_eq!(raw.ring.read_offset(), 40);
}

/// Test 64-byte ring with one fresh report
#[test]
fn test_fresh_report_scenario() {
    let ring = ring(64, HeaderFormat::Packed);
    let clock = ManualClock::new(NOW);
    RingProducer::new(&ring, &clock)
        .write_with_timestamp(EventKind::GetReport, NOW, &report_payload(0xDC))
        .unwrap();

    let mut reader = EventReader::with_clock(&clock, ReportLayout::Compact);
    let poll = reader.next_event(&ring, MAX_PAYLOAD).unwrap();
    let Some(DecodedEvent::GetReport(report)) = poll.into_event() else {
        panic!("expected a report");
    };
    assert_eq!(report.address.as_bytes()[0], 0xDC);
    assert!(report.status.is_ok());
    assert_eq!(ring.read_offset(), 25);
}

/// Test 64-byte ring with one report 200ms old
#[test]
fn test_stale_report_scenario() {
    let ring = ring(64, HeaderFormat::Packed);
    let clock = ManualClock::new(NOW);
    RingProducer::new(&ring, &clock)
        .write_with_timestamp(EventKind::GetReport, NOW - 200 * MS, &report_payload(0xDC))
        .unwrap();

    let mut reader = EventReader::with_clock(&clock, ReportLayout::Compact);
    assert_eq!(reader.next_event(&ring, MAX_PAYLOAD).unwrap(), EventPoll::Empty);
    assert_eq!(ring.read_offset(), 25);
}

/// Test reader follows the producer through a skip-marker wrap
#[test]
fn test_reader_follows_wrap() {
    let ring = ring(128, HeaderFormat::Packed);
    let clock = ManualClock::new(NOW);
    let producer = RingProducer::new(&ring, &clock);
    let mut reader = EventReader::with_clock(&clock, ReportLayout::Compact);

    let mut seen = Vec::new();
    for round in 0..40u8 {
        producer.write(EventKind::HidInfo, &[round; 30]).unwrap();
        let event = reader.next_event(&ring, MAX_PAYLOAD).unwrap().into_event().unwrap();
        if let DecodedEvent::Passthrough { payload, .. } = event {
            assert_eq!(payload.len(), 30);
            seen.push(payload[0]);
        }
        assert!(ring.is_empty());
    }

    assert_eq!(seen, (0..40u8).collect::<Vec<_>>());
    assert!(reader.stats().skip_markers > 0);
}

/// Test writable size always keeps one byte free
#[test]
fn test_writable_size_keeps_one_byte() {
    let ring = ring(64, HeaderFormat::Packed);
    assert_eq!(ring.writable_size(), 63);

    let producer = RingProducer::new(&ring, ManualClock::new(NOW));
    producer.write(EventKind::HidInfo, &[0; 8]).unwrap();
    assert_eq!(ring.writable_size(), 63 - 25);

    ring.force_offsets(30, 10);
    assert_eq!(ring.writable_size(), 19);
}

/// Test producer and consumer on separate threads
#[test]
fn test_cross_thread_stream() {
    const RECORDS: u32 = 2_000;

    let ring = Arc::new(ring(512, HeaderFormat::Native));
    let clock = Arc::new(ManualClock::new(NOW));

    let producer_ring = Arc::clone(&ring);
    let producer_clock = Arc::clone(&clock);
    let producer = thread::spawn(move || {
        let producer = RingProducer::new(&producer_ring, producer_clock);
        for seq in 0..RECORDS {
            let payload = seq.to_le_bytes();
            while producer.write(EventKind::ProtocolMode, &payload).is_err() {
                thread::yield_now();
            }
        }
    });

    let mut reader = EventReader::with_clock(Arc::clone(&clock), ReportLayout::Compact);
    let mut expected = 0u32;
    while expected < RECORDS {
        match reader.next_event(&ring, MAX_PAYLOAD).unwrap() {
            EventPoll::Ready(DecodedEvent::Passthrough { payload, .. }) => {
                let seq = u32::from_le_bytes(payload[..4].try_into().unwrap());
                assert_eq!(seq, expected);
                expected += 1;
            }
            EventPoll::Ready(other) => panic!("unexpected event {other}"),
            EventPoll::Empty => thread::sleep(Duration::from_micros(10)),
        }
    }

    producer.join().expect("producer thread panicked");
    assert!(ring.is_empty());
}

/// Test a reader attaches to a ring created through POSIX shared memory
#[test]
fn test_shared_memory_attach() {
    let name = RingName::new(format!("hrit{}", std::process::id())).unwrap();
    let geometry = RingGeometry::new(2048, HeaderFormat::Packed).unwrap();

    let owner = RingBuffer::create_shared(&name, geometry).expect("Failed to create ring");
    let clock = ManualClock::new(NOW);
    RingProducer::new(&owner, &clock)
        .write(EventKind::HidInfo, b"shared")
        .unwrap();

    let consumer = RingBuffer::open_shared(&name, geometry).expect("Failed to open ring");
    assert!(consumer.is_initialized());
    assert_eq!(consumer.name(), name.as_str());

    let mut reader = EventReader::with_clock(&clock, ReportLayout::Compact);
    let event = reader.next_event(&consumer, MAX_PAYLOAD).unwrap().into_event().unwrap();
    assert_eq!(
        event,
        DecodedEvent::Passthrough {
            kind: EventKind::HidInfo,
            payload: b"shared".to_vec(),
        }
    );
    assert!(owner.is_empty());
}

/// Test an uninitialized ring reads as empty but cannot be freed
#[test]
fn test_uninitialized_ring() {
    let geometry = RingGeometry::new(64, HeaderFormat::Packed).unwrap();
    let ring = RingBuffer::in_memory(geometry).unwrap();

    let mut reader = EventReader::with_clock(ManualClock::new(NOW), ReportLayout::Compact);
    assert!(reader.next_event(&ring, MAX_PAYLOAD).unwrap().is_empty());
    assert!(matches!(
        ring.free(),
        Err(HidRingError::NotInitialized { .. })
    ));
}
