use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Host-tunable recorder settings.
///
/// Every field has a default, so a settings file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Directory relative destination names are resolved against.
    pub storage_root: PathBuf,

    /// Capacity of the buffered writer in front of the destination file.
    pub write_buffer_bytes: usize,

    /// How long a push-fed stream read blocks before reporting "no data yet".
    pub stream_poll_ms: u64,

    /// Seconds of audio a push-fed stream holds before dropping the oldest.
    pub push_buffer_secs: f64,
}

impl RecorderSettings {
    pub fn from_json_file(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path)
            .map_err(|e| CaptureError::StorageError(format!("failed to read settings: {}", e)))?;
        let settings: RecorderSettings = serde_json::from_str(&json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("failed to parse settings: {}", e)))?;
        settings.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.write_buffer_bytes == 0 {
            return Err("write buffer must not be empty".into());
        }
        if self.stream_poll_ms == 0 {
            return Err("stream poll interval must be positive".into());
        }
        if self.push_buffer_secs.is_nan() || self.push_buffer_secs <= 0.0 {
            return Err(format!("push buffer length must be positive, got {}", self.push_buffer_secs));
        }
        Ok(())
    }

    pub fn stream_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stream_poll_ms)
    }

    /// Absolute destinations are kept; relative ones land under `storage_root`.
    pub fn resolve_destination(&self, destination: &Path) -> PathBuf {
        if destination.is_absolute() {
            destination.to_path_buf()
        } else {
            self.storage_root.join(destination)
        }
    }
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("."),
            write_buffer_bytes: 8192,
            stream_poll_ms: 100,
            push_buffer_secs: 5.0,
        }
    }
}
