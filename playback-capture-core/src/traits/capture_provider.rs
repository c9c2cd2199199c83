use std::sync::Arc;
use std::time::Duration;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::format::AudioFormat;
use crate::traits::audio_stream::AudioInputStream;

/// Default minimum read size: 40ms of audio.
pub const DEFAULT_MIN_BUFFER: Duration = Duration::from_millis(40);

/// Interface for platform-specific playback capture backends.
///
/// Implemented by:
/// - `WasapiLoopbackProvider` (Windows)
pub trait CaptureProvider: Send + Sync {
    /// Whether this capture backend is usable on the current device.
    fn is_available(&self) -> bool;

    /// Minimum viable read size in bytes for `format`.
    ///
    /// Authoritative: every sample buffer of a session is sized from it.
    fn min_buffer_size(&self, format: &AudioFormat) -> Result<usize, CaptureError> {
        let bytes = format.bytes_for(DEFAULT_MIN_BUFFER);
        if bytes == 0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "no viable buffer size for {:?}",
                format
            )));
        }
        Ok(bytes)
    }

    /// Open and start an input stream for `config`.
    ///
    /// Consumes the configuration; a revoked authorization or a device
    /// failure is reported as `OpenFailed`.
    fn open(
        &self,
        config: CaptureConfiguration,
        buffer_size: usize,
    ) -> Result<Arc<dyn AudioInputStream>, CaptureError>;

    /// Human readable backend name for logs.
    fn name(&self) -> &str;
}
