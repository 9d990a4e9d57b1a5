// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! hidring Core Library
//!
//! Consumer side of the Bluetooth HID event ring: a single-producer,
//! single-consumer circular byte buffer shared between a driver service
//! and a reader process. Provides the ring control block, record framing,
//! staleness filtering for report responses and payload decoding.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod layout;
pub mod reader;
pub mod shm;
pub mod types;

// Re-export commonly used types
pub use clock::{ManualClock, MonotonicClock, TickSource};
pub use config::{Config, ConfigLoader, ReaderConfig, RingConfig};
pub use error::{
    DecodeError, FramingError, HardValidationError, HidRingError, HidRingResult, SharedMemoryError,
};
pub use event::{ConnectionStateEvent, DecodedEvent, GetReportEvent, HidConnectionState, HidStatus};
pub use layout::ReportLayout;
pub use reader::{EventPoll, EventReader, ReaderStats, DEFAULT_STALENESS_WINDOW};
pub use shm::{EventKind, HeaderFormat, RecordHeader, RingBuffer, RingGeometry, RingProducer};
pub use types::{BluetoothAddress, FirmwareVersion, RingName};
