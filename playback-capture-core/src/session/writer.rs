use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::error::{CaptureError, StreamError};
use crate::models::format::AudioFormat;
use crate::models::recording_result::{RecordingResult, StopReason};
use crate::session::listeners::ListenerRegistry;
use crate::storage::pcm_writer::PcmFileWriter;
use crate::traits::audio_stream::AudioInputStream;

/// Everything the writer thread owns for one session.
pub(crate) struct WriterContext {
    pub session_id: Uuid,
    pub stream: Arc<dyn AudioInputStream>,
    pub recording: Arc<AtomicBool>,
    pub destination: PathBuf,
    pub buffer_size: usize,
    pub write_buffer_bytes: usize,
    pub format: AudioFormat,
    pub started_at: DateTime<Utc>,
    pub listeners: Arc<ListenerRegistry>,
}

struct Drained {
    result: Option<RecordingResult>,
    error: Option<CaptureError>,
}

/// Spawn the dedicated writer thread for a session.
pub(crate) fn spawn_writer(ctx: WriterContext) -> Result<thread::JoinHandle<()>, CaptureError> {
    let name = format!("pcm-writer-{}", &ctx.session_id.simple().to_string()[..8]);
    thread::Builder::new()
        .name(name)
        .spawn(move || run(ctx))
        .map_err(|e| CaptureError::Unknown(format!("failed to spawn writer thread: {}", e)))
}

fn run(ctx: WriterContext) {
    let drained = drain(&ctx);

    // If the flag was still set, the writer ended on its own: tear the
    // session down from this side.
    if ctx.recording.swap(false, Ordering::SeqCst) {
        ctx.stream.close();
        ctx.listeners.state_changed(false);
    }

    if let Some(ref error) = drained.error {
        log::error!("Session {} writer failed: {}", ctx.session_id, error);
        ctx.listeners.error(error);
    }
    if let Some(ref result) = drained.result {
        log::info!(
            "Session {} finished ({:?}): {} bytes, {:.2}s written to {}",
            ctx.session_id,
            result.stop_reason,
            result.bytes_written,
            result.duration_secs,
            result.file_path.display()
        );
        ctx.listeners.capture_finished(result);
    }
}

/// Read-then-write loop. Runs until the recording flag is cleared, the stream
/// ends, or a write fails; then flushes and closes the file exactly once. A
/// failed write or flush ends the loop and is reported with the bytes that
/// reached the file.
fn drain(ctx: &WriterContext) -> Drained {
    let mut writer = match PcmFileWriter::create(ctx.destination.clone(), &ctx.format, ctx.write_buffer_bytes) {
        Ok(writer) => writer,
        Err(e) => {
            return Drained {
                result: None,
                error: Some(e),
            }
        }
    };

    let mut buffer = vec![0u8; ctx.buffer_size];
    let mut stop_reason = StopReason::Requested;
    let mut error = None;

    while ctx.recording.load(Ordering::SeqCst) {
        match ctx.stream.read(&mut buffer) {
            Ok(0) | Err(StreamError::NotReady) => continue,
            Ok(read) => {
                if let Err(e) = writer.write(&buffer[..read]) {
                    stop_reason = StopReason::WriteFailed;
                    error = Some(e);
                    break;
                }
            }
            Err(StreamError::Closed) => {
                log::debug!("Session {} input stream closed", ctx.session_id);
                // Closed by a concurrent stop counts as requested.
                if ctx.recording.load(Ordering::SeqCst) {
                    stop_reason = StopReason::StreamEnded;
                }
                break;
            }
            Err(StreamError::Dead(reason)) => {
                stop_reason = StopReason::StreamEnded;
                error = Some(CaptureError::StreamLost(reason));
                break;
            }
        }
    }

    if error.is_none() {
        if let Err(e) = writer.flush() {
            stop_reason = StopReason::WriteFailed;
            error = Some(e);
        }
    }

    // Bytes the failed write left in the buffer are dropped, never retried.
    let (bytes_written, checksum) = if stop_reason == StopReason::WriteFailed {
        (writer.abandon(), None)
    } else {
        match writer.finish() {
            Ok((bytes, checksum)) => (bytes, Some(checksum)),
            Err(e) => {
                return Drained {
                    result: None,
                    error: Some(error.unwrap_or(e)),
                }
            }
        }
    };

    Drained {
        result: Some(RecordingResult {
            session_id: ctx.session_id.to_string(),
            file_path: ctx.destination.clone(),
            bytes_written,
            duration_secs: ctx.format.duration_of(bytes_written),
            checksum,
            started_at: ctx.started_at.to_rfc3339(),
            stop_reason,
        }),
        error,
    }
}
