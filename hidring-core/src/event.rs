// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Typed events decoded from ring records.
//!
//! Events own their bytes. Nothing here borrows from the ring, so a record
//! can be freed as soon as it has been decoded.

use std::fmt;

use serde::Serialize;

use crate::error::DecodeError;
use crate::shm::EventKind;
use crate::types::BluetoothAddress;

/// Size of the fixed connection-state payload: address, 2 bytes padding, u32 state.
pub const CONNECTION_STATE_SIZE: usize = 12;

/// HID connection state reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HidConnectionState {
    Connected,
    Connecting,
    Disconnected,
    Disconnecting,
    FailedMouseFromHost,
    FailedKeyboardFromHost,
    FailedTooManyDevices,
    FailedNoBluetoothHidDriver,
    FailedGeneric,
    Unknown,
}

impl HidConnectionState {
    /// Map the raw driver value; out-of-range values become `Unknown`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Connected,
            1 => Self::Connecting,
            2 => Self::Disconnected,
            3 => Self::Disconnecting,
            4 => Self::FailedMouseFromHost,
            5 => Self::FailedKeyboardFromHost,
            6 => Self::FailedTooManyDevices,
            7 => Self::FailedNoBluetoothHidDriver,
            8 => Self::FailedGeneric,
            _ => Self::Unknown,
        }
    }
}

/// Status attached to a report response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HidStatus {
    Ok,
    HandshakeHidNotReady,
    HandshakeInvalidReportId,
    HandshakeTransactionNotSupported,
    HandshakeInvalidParameter,
    HandshakeError,
    Error,
    ErrorSdp,
    ErrorProtocol,
    ErrorDatabaseFull,
    ErrorDeviceTypeUnsupported,
    ErrorNoResources,
    ErrorAuthenticationFailed,
    ErrorHdl,
    Other(u32),
}

impl HidStatus {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Ok,
            1 => Self::HandshakeHidNotReady,
            2 => Self::HandshakeInvalidReportId,
            3 => Self::HandshakeTransactionNotSupported,
            4 => Self::HandshakeInvalidParameter,
            5 => Self::HandshakeError,
            6 => Self::Error,
            7 => Self::ErrorSdp,
            8 => Self::ErrorProtocol,
            9 => Self::ErrorDatabaseFull,
            10 => Self::ErrorDeviceTypeUnsupported,
            11 => Self::ErrorNoResources,
            12 => Self::ErrorAuthenticationFailed,
            13 => Self::ErrorHdl,
            other => Self::Other(other),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// A connection-state change for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStateEvent {
    pub address: BluetoothAddress,
    pub state: HidConnectionState,
}

impl ConnectionStateEvent {
    /// Decode the fixed connection-state struct.
    pub fn decode(payload: &[u8], max_payload: usize) -> Result<Self, DecodeError> {
        if payload.len() < CONNECTION_STATE_SIZE {
            return Err(DecodeError::PayloadTooShort {
                kind: EventKind::ConnectionState,
                needed: CONNECTION_STATE_SIZE,
                actual: payload.len(),
            });
        }
        if max_payload < CONNECTION_STATE_SIZE {
            return Err(DecodeError::BufferTooSmall {
                needed: CONNECTION_STATE_SIZE,
                available: max_payload,
            });
        }

        let mut address = [0u8; BluetoothAddress::LEN];
        address.copy_from_slice(&payload[..BluetoothAddress::LEN]);
        let mut raw_state = [0u8; 4];
        raw_state.copy_from_slice(&payload[8..12]);

        Ok(Self {
            address: BluetoothAddress::new(address),
            state: HidConnectionState::from_raw(u32::from_ne_bytes(raw_state)),
        })
    }
}

/// Response to an earlier get-report request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetReportEvent {
    pub address: BluetoothAddress,
    pub status: HidStatus,
    /// Payload size of the record this event came from.
    pub report_length: u32,
    /// Report bytes as laid out by the producer's firmware.
    pub report: Vec<u8>,
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecodedEvent {
    ConnectionState(ConnectionStateEvent),
    GetReport(GetReportEvent),
    /// Kinds not interpreted structurally; raw bytes, possibly truncated.
    Passthrough { kind: EventKind, payload: Vec<u8> },
}

impl DecodedEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ConnectionState(_) => EventKind::ConnectionState,
            Self::GetReport(_) => EventKind::GetReport,
            Self::Passthrough { kind, .. } => *kind,
        }
    }
}

impl fmt::Display for DecodedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionState(ev) => {
                write!(f, "ConnectionState {} {:?}", ev.address, ev.state)
            }
            Self::GetReport(ev) => write!(
                f,
                "GetReport {} {:?} length={} report={}B",
                ev.address,
                ev.status,
                ev.report_length,
                ev.report.len()
            ),
            Self::Passthrough { kind, payload } => {
                write!(f, "{} payload={}B", kind, payload.len())
            }
        }
    }
}
