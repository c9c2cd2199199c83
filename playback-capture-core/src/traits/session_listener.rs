use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;

/// Observer of capture session transitions.
///
/// Methods may be called from the controller's calling thread or from the
/// writer thread. Implementations may query `state()` but must not start or
/// stop the session from a callback.
pub trait SessionListener: Send + Sync {
    /// Called once when a session starts recording and once when it stops.
    fn on_state_changed(&self, recording: bool);

    /// Requested applications resolved to no selectors; capture is unscoped.
    fn on_degraded_match(&self, _requested: &[String]) {}

    /// Writer-side failure: destination not writable, write error, stream death.
    fn on_error(&self, _error: &CaptureError) {}

    /// The destination file has been flushed and closed.
    fn on_capture_finished(&self, _result: &RecordingResult) {}
}
