// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for hidring.
//!
//! Explicit enum error types only. No `Box<dyn Error>`, no `anyhow::Result`.
//! "No event available" is deliberately absent: an empty ring is a normal
//! polling outcome and is reported through [`crate::reader::EventPoll`].

use std::path::PathBuf;

use thiserror::Error;

use crate::shm::EventKind;

/// Top-level error type for the HID event ring consumer.
#[derive(Debug, Error)]
pub enum HidRingError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Ring Errors - Stop Trusting This Buffer Instance
    // =========================================================================
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Ring buffer '{name}' has not been initialized by the producer")]
    NotInitialized { name: String },

    #[error("Shared memory error: {0}")]
    SharedMemory(#[from] SharedMemoryError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl HidRingError {
    /// Whether the ring instance that produced this error can still be read.
    ///
    /// Decode errors consume exactly one record and leave the cursor valid.
    /// Everything else means the caller should reset or reattach.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Corruption of the shared framing. Fatal to the current read attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("{field} offset {offset} is outside capacity {capacity}")]
    OffsetOutOfRange {
        field: &'static str,
        offset: u32,
        capacity: u32,
    },

    #[error("Record header at offset {offset} ({header_size} bytes) straddles capacity {capacity}")]
    HeaderOverrun {
        offset: u32,
        header_size: u32,
        capacity: u32,
    },

    #[error("Advancing {consumed} bytes from offset {offset} overruns capacity {capacity}")]
    AdvanceOverrun {
        offset: u32,
        consumed: u64,
        capacity: u32,
    },

    #[error("Record at offset {offset} ends at {end}, past write offset {write_offset}")]
    RecordPastWriteOffset {
        offset: u32,
        end: u64,
        write_offset: u32,
    },

    #[error("Record payload size {size} at offset {offset} is not representable")]
    SizeOverflow { offset: u32, size: u64 },
}

/// Decode failures for a single record. The record is still freed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Destination holds {available} bytes but {needed} are required")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("{kind} payload is {actual} bytes, layout requires at least {needed}")]
    PayloadTooShort {
        kind: EventKind,
        needed: usize,
        actual: usize,
    },
}

/// Shared memory errors - critical failures with no fallback.
#[derive(Debug, Error)]
pub enum SharedMemoryError {
    #[error("Failed to create shared memory region: {name} - {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Failed to open shared memory region: {name} - {reason}")]
    OpenFailed { name: String, reason: String },

    #[error("Failed to map shared memory: {reason}")]
    MapFailed { reason: String },

    #[error("Region of {size} bytes cannot hold a ring of capacity {capacity} (needs {required})")]
    RegionTooSmall {
        size: usize,
        capacity: u32,
        required: usize,
    },

    #[error("Ring declares capacity {found}, expected {expected}")]
    CapacityMismatch { expected: u32, found: u32 },

    #[error("Ring buffer is not initialized")]
    Uninitialized,

    #[error("Ring control block is corrupted: {reason}")]
    CorruptControlBlock { reason: String },

    #[error("Ring buffer '{name}' is already initialized")]
    AlreadyInitialized { name: String },

    #[error("Ring buffer full - cannot write {size} bytes ({writable} writable)")]
    RingBufferFull { size: usize, writable: u32 },

    #[error("Payload size exceeds maximum: {size} > {max}")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Hard validation errors for configuration and newtype construction.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Conflicting fields: {first} and {second} - {reason}")]
    ConflictingFields {
        first: &'static str,
        second: &'static str,
        reason: String,
    },
}

/// Result type alias using HidRingError.
pub type HidRingResult<T> = Result<T, HidRingError>;
