// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared memory ring module.
//!
//! Control block, record framing and both halves of the SPSC protocol.

mod producer;
mod record;
mod region;
mod ring_buffer;

pub use producer::RingProducer;
pub use record::{EventKind, HeaderFormat, RecordHeader};
pub use region::{SharedMemoryRegion, PAGE_SIZE};
pub use ring_buffer::{RingBuffer, RingGeometry, CONTROL_SIZE, DEFAULT_CAPACITY, MAX_CAPACITY};
