use thiserror::Error;

/// Errors that can occur during playback capture operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Missing authorization or invalid settings. Fatal to `start`.
    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    /// The device input stream could not be opened. Fatal to `start`.
    #[error("failed to open audio input stream: {0}")]
    OpenFailed(String),

    /// Destination file I/O failed inside the writer. Ends the recording.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The input stream died underneath the writer.
    #[error("audio input stream lost: {0}")]
    StreamLost(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Read-side failures of an [`AudioInputStream`](crate::traits::audio_stream::AudioInputStream).
///
/// Only `NotReady` is recoverable: the reader should re-check its stop flag
/// and read again.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("no data available yet")]
    NotReady,

    #[error("stream closed")]
    Closed,

    #[error("stream died: {0}")]
    Dead(String),
}
