// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! Describes which ring to attach to and how to read it. Any invalid field
//! results in a HardValidationError before a ring is touched.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::clock::TickSource;
use crate::error::{HardValidationError, HidRingError, HidRingResult};
use crate::layout::ReportLayout;
use crate::reader::EventReader;
use crate::shm::{HeaderFormat, RingGeometry, DEFAULT_CAPACITY, MAX_CAPACITY};
use crate::types::{FirmwareVersion, RingName};

/// Raw ring section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawRingConfig {
    #[serde(default = "default_ring_name")]
    name: String,
    #[serde(default = "default_capacity")]
    capacity: u32,
    #[serde(default)]
    header_format: HeaderFormat,
}

fn default_ring_name() -> String {
    "bt-hid-events".to_string()
}

fn default_capacity() -> u32 {
    DEFAULT_CAPACITY
}

impl Default for RawRingConfig {
    fn default() -> Self {
        Self {
            name: default_ring_name(),
            capacity: default_capacity(),
            header_format: HeaderFormat::default(),
        }
    }
}

/// Raw reader section.
#[derive(Debug, Deserialize)]
struct RawReaderConfig {
    #[serde(default = "default_staleness_window_ms")]
    staleness_window_ms: u64,
    #[serde(default = "default_max_payload")]
    max_payload: usize,
    #[serde(default)]
    layout: Option<ReportLayout>,
    #[serde(default)]
    firmware_version: Option<FirmwareVersion>,
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
}

fn default_staleness_window_ms() -> u64 {
    100
}

fn default_max_payload() -> usize {
    0x2C8
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl Default for RawReaderConfig {
    fn default() -> Self {
        Self {
            staleness_window_ms: default_staleness_window_ms(),
            max_payload: default_max_payload(),
            layout: None,
            firmware_version: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    ring: RawRingConfig,
    #[serde(default)]
    reader: RawReaderConfig,
}

/// Validated ring settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConfig {
    pub name: RingName,
    pub geometry: RingGeometry,
}

/// Validated reader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    pub staleness_window: Duration,
    pub max_payload: usize,
    pub layout: ReportLayout,
    pub poll_interval: Duration,
}

impl ReaderConfig {
    /// Build a reader on `clock` with these settings.
    pub fn build<C: TickSource>(&self, clock: C) -> EventReader<C> {
        EventReader::with_clock(clock, self.layout).staleness_window(self.staleness_window)
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub ring: RingConfig,
    pub reader: ReaderConfig,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> HidRingResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(HidRingError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| HidRingError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> HidRingResult<Config> {
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| HidRingError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> HidRingResult<Config> {
        let ring = Self::validate_ring(raw.ring)?;
        let reader = Self::validate_reader(raw.reader)?;
        Ok(Config { ring, reader })
    }

    fn validate_ring(raw: RawRingConfig) -> HidRingResult<RingConfig> {
        let name = RingName::new(raw.name)?;
        let geometry = RingGeometry::new(raw.capacity, raw.header_format)?;
        Ok(RingConfig { name, geometry })
    }

    fn validate_reader(raw: RawReaderConfig) -> HidRingResult<ReaderConfig> {
        if !(1..=10_000).contains(&raw.staleness_window_ms) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "reader.staleness_window_ms",
                value: raw.staleness_window_ms.to_string(),
                reason: "Must be between 1 and 10000".to_string(),
            }
            .into());
        }

        if raw.max_payload == 0 || raw.max_payload > MAX_CAPACITY as usize {
            return Err(HardValidationError::InvalidFieldValue {
                field: "reader.max_payload",
                value: raw.max_payload.to_string(),
                reason: format!("Must be between 1 and {}", MAX_CAPACITY),
            }
            .into());
        }

        if !(1..=60_000).contains(&raw.poll_interval_ms) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "reader.poll_interval_ms",
                value: raw.poll_interval_ms.to_string(),
                reason: "Must be between 1 and 60000".to_string(),
            }
            .into());
        }

        let layout = match (raw.layout, raw.firmware_version) {
            (Some(_), Some(_)) => {
                return Err(HardValidationError::ConflictingFields {
                    first: "reader.layout",
                    second: "reader.firmware_version",
                    reason: "Set one or the other".to_string(),
                }
                .into());
            }
            (Some(layout), None) => layout,
            (None, Some(version)) => ReportLayout::for_firmware(version),
            (None, None) => ReportLayout::default(),
        };

        Ok(ReaderConfig {
            staleness_window: Duration::from_millis(raw.staleness_window_ms),
            max_payload: raw.max_payload,
            layout,
            poll_interval: Duration::from_millis(raw.poll_interval_ms),
        })
    }
}
