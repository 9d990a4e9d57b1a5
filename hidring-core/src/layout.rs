// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Firmware-specific payload sub-layouts for report records.
//!
//! The producer changed where it puts the device address inside a
//! get-report payload between firmware releases. Callers pick the layout
//! once; the reader never branches on versions itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::event::{DecodedEvent, GetReportEvent, HidStatus};
use crate::shm::EventKind;
use crate::types::{BluetoothAddress, FirmwareVersion};

/// Offset of the embedded report in `Legacy` and `V2` payloads.
const REPORT_DATA_OFFSET: usize = 12;

/// Payload sub-layout for get-report records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLayout {
    /// `address[6] | status:u16 | report...`
    #[default]
    Compact,
    /// Before 9.0.0: `size:u16 | unk:u8 | address[6] | unk[3] | report...`
    Legacy,
    /// 9.0.0 and later: `unk[5] | address[6] | unk:u8 | report...`
    V2,
}

impl ReportLayout {
    /// Layout used by a given driver firmware.
    pub fn for_firmware(version: FirmwareVersion) -> Self {
        if version.at_least(9, 0, 0) {
            Self::V2
        } else {
            Self::Legacy
        }
    }

    /// Byte offset of the device address.
    pub const fn address_offset(self) -> usize {
        match self {
            Self::Compact => 0,
            Self::Legacy => 3,
            Self::V2 => 5,
        }
    }

    /// Byte offset of the report bytes; also the minimum payload size.
    pub const fn report_offset(self) -> usize {
        match self {
            Self::Compact => 8,
            Self::Legacy | Self::V2 => REPORT_DATA_OFFSET,
        }
    }

    /// Fixed upper bound on passthrough copies for `kind`, if any.
    pub const fn passthrough_limit(self, kind: EventKind) -> Option<usize> {
        match (self, kind) {
            (Self::V2, EventKind::Unknown09) => Some(0x2C8),
            (Self::Legacy, EventKind::Unknown09) => Some(0x290),
            _ => None,
        }
    }

    /// Decode a get-report payload.
    ///
    /// `max_payload` is the caller's destination size; a report that does
    /// not fit is an error, never truncated. Only the report bytes after
    /// `report_offset()` count against it; the address and status go into
    /// their own fields.
    pub fn decode_report(self, payload: &[u8], max_payload: usize) -> Result<GetReportEvent, DecodeError> {
        let report_at = self.report_offset();
        if payload.len() < report_at {
            return Err(DecodeError::PayloadTooShort {
                kind: EventKind::GetReport,
                needed: report_at,
                actual: payload.len(),
            });
        }

        let report = &payload[report_at..];
        if report.len() > max_payload {
            return Err(DecodeError::BufferTooSmall {
                needed: report.len(),
                available: max_payload,
            });
        }

        let addr_at = self.address_offset();
        let address = BluetoothAddress::from_slice(&payload[addr_at..]).ok_or(
            DecodeError::PayloadTooShort {
                kind: EventKind::GetReport,
                needed: addr_at + BluetoothAddress::LEN,
                actual: payload.len(),
            },
        )?;

        let status = match self {
            Self::Compact => HidStatus::from_raw(u16::from_ne_bytes([payload[6], payload[7]]) as u32),
            Self::Legacy | Self::V2 => HidStatus::Ok,
        };

        Ok(GetReportEvent {
            address,
            status,
            report_length: payload.len() as u32,
            report: report.to_vec(),
        })
    }

    /// Copy an uninterpreted payload, truncating to the documented maximum.
    pub fn decode_passthrough(self, kind: EventKind, payload: &[u8], max_payload: usize) -> DecodedEvent {
        let limit = self
            .passthrough_limit(kind)
            .map_or(max_payload, |fixed| fixed.min(max_payload));
        let take = payload.len().min(limit);
        DecodedEvent::Passthrough {
            kind,
            payload: payload[..take].to_vec(),
        }
    }
}

impl fmt::Display for ReportLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compact => "compact",
            Self::Legacy => "legacy",
            Self::V2 => "v2",
        };
        write!(f, "{}", name)
    }
}
