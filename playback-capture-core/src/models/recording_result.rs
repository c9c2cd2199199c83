use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Why the writer stopped draining the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The controller cleared the recording flag.
    Requested,
    /// The input stream was closed or died underneath the writer.
    StreamEnded,
    /// A destination write failed; no retry is attempted.
    WriteFailed,
}

/// Summary the writer reports once the destination file is flushed and closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingResult {
    pub session_id: String,
    pub file_path: PathBuf,
    pub bytes_written: u64,
    /// Audio length derived from `bytes_written` and the capture format.
    pub duration_secs: f64,
    /// SHA-256 hex digest of the bytes on disk. `None` when the recording
    /// ended on a write failure.
    pub checksum: Option<String>,
    /// RFC 3339 timestamp of the session start.
    pub started_at: String,
    pub stop_reason: StopReason,
}
