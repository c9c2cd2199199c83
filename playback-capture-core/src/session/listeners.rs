use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::traits::session_listener::SessionListener;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subscribers shared between the controller and its writer threads.
///
/// Callbacks run on a snapshot taken outside the lock, so a listener may
/// subscribe or unsubscribe from inside a callback.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Mutex<Vec<(SubscriptionId, Arc<dyn SessionListener>)>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn subscribe(&self, listener: Arc<dyn SessionListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn snapshot(&self) -> Vec<Arc<dyn SessionListener>> {
        self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    pub(crate) fn state_changed(&self, recording: bool) {
        for listener in self.snapshot() {
            listener.on_state_changed(recording);
        }
    }

    pub(crate) fn degraded_match(&self, requested: &[String]) {
        for listener in self.snapshot() {
            listener.on_degraded_match(requested);
        }
    }

    pub(crate) fn error(&self, error: &CaptureError) {
        for listener in self.snapshot() {
            listener.on_error(error);
        }
    }

    pub(crate) fn capture_finished(&self, result: &RecordingResult) {
        for listener in self.snapshot() {
            listener.on_capture_finished(result);
        }
    }
}
