//! Application configuration.
//!
//! Loaded from an optional JSON file; every field has a default.

use crate::media::{MediaDeviceInfo, MediaDeviceKind};
use crate::select::{SelectVariant, TrackControlOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for the `track-select` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Device kind the control manages
    pub kind: MediaDeviceKind,

    pub variant: SelectVariant,

    /// Start with the track enabled
    pub pressed: bool,

    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log_level: Option<String>,

    /// Device table for the in-memory source used off Windows
    pub devices: Vec<MediaDeviceInfo>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            kind: MediaDeviceKind::AudioInput,
            variant: SelectVariant::default(),
            pressed: true,
            log_level: None,
            devices: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Options for the track control this config describes.
    pub fn track_options(&self) -> TrackControlOptions {
        TrackControlOptions::for_kind(self.kind)
            .pressed(self.pressed)
            .variant(self.variant)
    }
}
