// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Record framing inside the ring data area.
//!
//! ```text
//! Packed (17 bytes):  kind:u8 | timestamp:u64 | size:u64 | payload...
//! Native (24 bytes):  kind:u8 | pad[7] | timestamp:u64 | size:u64 | payload...
//! ```
//!
//! All integers are native-endian. `Native` matches the C struct the
//! driver service writes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Encoding of a record header. Producer and consumer must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderFormat {
    #[default]
    Packed,
    Native,
}

impl HeaderFormat {
    /// Header size in bytes.
    pub const fn size(self) -> u32 {
        match self {
            Self::Packed => 17,
            Self::Native => 24,
        }
    }

    const fn timestamp_at(self) -> usize {
        match self {
            Self::Packed => 1,
            Self::Native => 8,
        }
    }

    const fn size_at(self) -> usize {
        match self {
            Self::Packed => 9,
            Self::Native => 16,
        }
    }
}

/// Kind tag of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConnectionState,
    HidInfo,
    ProtocolMode,
    IdleTime,
    GetReport,
    VirtualUnplug,
    Handshake,
    Unknown07,
    Unknown08,
    Unknown09,
    /// Producer padding; never surfaced to callers.
    Skip,
    Other(u8),
}

impl EventKind {
    pub const SKIP_TAG: u8 = 0xFF;

    pub const fn tag(self) -> u8 {
        match self {
            Self::ConnectionState => 0,
            Self::HidInfo => 1,
            Self::ProtocolMode => 2,
            Self::IdleTime => 3,
            Self::GetReport => 4,
            Self::VirtualUnplug => 5,
            Self::Handshake => 6,
            Self::Unknown07 => 7,
            Self::Unknown08 => 8,
            Self::Unknown09 => 9,
            Self::Skip => Self::SKIP_TAG,
            Self::Other(tag) => tag,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ConnectionState => "ConnectionState",
            Self::HidInfo => "HidInfo",
            Self::ProtocolMode => "ProtocolMode",
            Self::IdleTime => "IdleTime",
            Self::GetReport => "GetReport",
            Self::VirtualUnplug => "VirtualUnplug",
            Self::Handshake => "Handshake",
            Self::Unknown07 => "Unknown07",
            Self::Unknown08 => "Unknown08",
            Self::Unknown09 => "Unknown09",
            Self::Skip => "Skip",
            Self::Other(_) => "Other",
        }
    }
}

impl From<u8> for EventKind {
    fn from(tag: u8) -> Self {
        match tag {
            0 => Self::ConnectionState,
            1 => Self::HidInfo,
            2 => Self::ProtocolMode,
            3 => Self::IdleTime,
            4 => Self::GetReport,
            5 => Self::VirtualUnplug,
            6 => Self::Handshake,
            7 => Self::Unknown07,
            8 => Self::Unknown08,
            9 => Self::Unknown09,
            Self::SKIP_TAG => Self::Skip,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(tag) => write!(f, "Other({:#04x})", tag),
            kind => write!(f, "{}", kind.name()),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub kind: EventKind,
    /// Producer tick count when the record was written.
    pub timestamp: u64,
    /// Payload size in bytes as declared by the producer. Untrusted.
    pub size: u64,
}

impl RecordHeader {
    pub fn new(kind: EventKind, timestamp: u64, size: u64) -> Self {
        Self {
            kind,
            timestamp,
            size,
        }
    }

    /// Decode a header from the first `format.size()` bytes of `bytes`.
    ///
    /// Returns `None` if `bytes` is too short.
    pub fn decode(bytes: &[u8], format: HeaderFormat) -> Option<Self> {
        let raw = bytes.get(..format.size() as usize)?;
        let ts_at = format.timestamp_at();
        let size_at = format.size_at();

        let timestamp = u64::from_ne_bytes(raw[ts_at..ts_at + 8].try_into().ok()?);
        let size = u64::from_ne_bytes(raw[size_at..size_at + 8].try_into().ok()?);

        Some(Self {
            kind: EventKind::from(raw[0]),
            timestamp,
            size,
        })
    }

    /// Encode into a header-sized byte vector. Padding bytes are zero.
    pub fn encode(&self, format: HeaderFormat) -> Vec<u8> {
        let mut out = vec![0u8; format.size() as usize];
        let ts_at = format.timestamp_at();
        let size_at = format.size_at();

        out[0] = self.kind.tag();
        out[ts_at..ts_at + 8].copy_from_slice(&self.timestamp.to_ne_bytes());
        out[size_at..size_at + 8].copy_from_slice(&self.size.to_ne_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_sizes() {
        assert_eq!(HeaderFormat::Packed.size(), 17);
        assert_eq!(HeaderFormat::Native.size(), 24);
    }

    #[test]
    fn test_native_layout_offsets() {
        let header = RecordHeader::new(EventKind::GetReport, 0x0102_0304_0506_0708, 8);
        let bytes = header.encode(HeaderFormat::Native);

        assert_eq!(bytes[0], 4);
        assert!(bytes[1..8].iter().all(|&b| b == 0));
        assert_eq!(&bytes[8..16], &0x0102_0304_0506_0708u64.to_ne_bytes());
        assert_eq!(&bytes[16..24], &8u64.to_ne_bytes());
    }

    #[test]
    fn test_decode_short_input() {
        assert!(RecordHeader::decode(&[0u8; 16], HeaderFormat::Packed).is_none());
        assert!(RecordHeader::decode(&[0u8; 17], HeaderFormat::Packed).is_some());
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(EventKind::from(4), EventKind::GetReport);
        assert_eq!(EventKind::from(0xFF), EventKind::Skip);
        assert_eq!(EventKind::from(0x42), EventKind::Other(0x42));
        assert_eq!(EventKind::Other(0x42).tag(), 0x42);
        assert_eq!(EventKind::Other(0x42).to_string(), "Other(0x42)");
    }
}
