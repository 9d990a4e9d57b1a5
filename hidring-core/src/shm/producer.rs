// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Writer half of the ring.
//!
//! In production the driver service owns this side. The crate carries it
//! so the reader can be exercised end to end: tests, benchmarks and the
//! `hidring simulate` command all write through [`RingProducer`].
//!
//! Placement rule: a record goes at the write offset if it ends exactly at
//! capacity or leaves room for at least one more header. Otherwise the tail
//! is filled with a skip marker and the record goes to offset 0. Records
//! never wrap.

use crate::clock::TickSource;
use crate::error::SharedMemoryError;
use crate::shm::record::{EventKind, RecordHeader};
use crate::shm::ring_buffer::RingBuffer;

/// Single producer for a [`RingBuffer`].
pub struct RingProducer<'a, C: TickSource> {
    ring: &'a RingBuffer,
    clock: C,
}

impl<'a, C: TickSource> RingProducer<'a, C> {
    pub fn new(ring: &'a RingBuffer, clock: C) -> Self {
        Self { ring, clock }
    }

    pub fn ring(&self) -> &RingBuffer {
        self.ring
    }

    /// Write a record stamped with the producer's clock.
    pub fn write(&self, kind: EventKind, payload: &[u8]) -> Result<(), SharedMemoryError> {
        self.write_with_timestamp(kind, self.clock.now(), payload)
    }

    /// Write a record with an explicit timestamp.
    pub fn write_with_timestamp(
        &self,
        kind: EventKind,
        timestamp: u64,
        payload: &[u8],
    ) -> Result<(), SharedMemoryError> {
        let ring = self.ring;
        let capacity = ring.capacity();
        let header_size = ring.geometry().header_size();

        if !ring.is_initialized() {
            return Err(SharedMemoryError::Uninitialized);
        }

        let too_large = SharedMemoryError::PayloadTooLarge {
            size: payload.len(),
            max: (capacity - header_size - 1) as usize,
        };
        let span = u32::try_from(payload.len())
            .ok()
            .and_then(|len| len.checked_add(header_size))
            .filter(|&span| span < capacity)
            .ok_or(too_large)?;

        let (read, write) = ring
            .offsets()
            .map_err(|e| SharedMemoryError::CorruptControlBlock {
                reason: e.to_string(),
            })?;

        let fits_at = |offset: u32| {
            let end = offset + span;
            end == capacity || end + header_size <= capacity
        };

        let full = |writable: u32| SharedMemoryError::RingBufferFull {
            size: payload.len(),
            writable,
        };

        let writable = ring.writable_size();
        let target = if fits_at(write) {
            if span > writable {
                return Err(full(writable));
            }
            write
        } else {
            if !fits_at(0) {
                return Err(SharedMemoryError::PayloadTooLarge {
                    size: payload.len(),
                    max: (capacity - 2 * header_size) as usize,
                });
            }
            // Wrap: the record must end before unread data at `read`.
            if read > write || span >= read {
                return Err(full(writable));
            }
            let tail = capacity - write;
            let skip = RecordHeader::new(EventKind::Skip, timestamp, (tail - header_size) as u64);
            ring.copy_in(write, &skip.encode(ring.header_format()));
            tracing::trace!(offset = write, tail = tail, "Padded ring tail with skip marker");
            0
        };

        let header = RecordHeader::new(kind, timestamp, payload.len() as u64);
        ring.copy_in(target, &header.encode(ring.header_format()));
        ring.copy_in(target + header_size, payload);

        let end = target + span;
        let next = if end == capacity { 0 } else { end };
        ring.publish_write_offset(next);

        tracing::trace!(
            kind = %kind,
            offset = target,
            size = payload.len(),
            "Wrote record"
        );
        Ok(())
    }
}
