use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::authorization::CaptureAuthorization;
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::format::AudioFormat;
use crate::models::selectors::SelectorSet;
use crate::models::settings::RecorderSettings;
use crate::models::state::SessionState;
use crate::session::listeners::{ListenerRegistry, SubscriptionId};
use crate::session::writer::{spawn_writer, WriterContext};
use crate::traits::audio_stream::AudioInputStream;
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::session_listener::SessionListener;

/// The one stream + writer pair of a recording session.
struct ActiveSession {
    id: Uuid,
    destination: PathBuf,
    stream: Arc<dyn AudioInputStream>,
    recording: Arc<AtomicBool>,
    writer: JoinHandle<()>,
}

#[derive(Default)]
struct Lifecycle {
    active: Option<ActiveSession>,
    /// Writers that were signalled to stop but not joined yet.
    retired: Vec<JoinHandle<()>>,
}

/// Playback capture session controller.
///
/// Generic over the platform backend via the `CaptureProvider` trait. Owns
/// the idle → recording → idle lifecycle and guarantees at most one active
/// stream + writer pair.
///
/// ```text
/// start(auth, file, selectors)
///   → min_buffer_size → CaptureConfiguration::build → provider.open
///   → recording = true → [writer thread: stream.read → PcmFileWriter]
/// stop()
///   → recording = false → stream.close
/// ```
///
/// `start` and `stop` take `&self` and are serialized internally, so the
/// controller can be shared across threads behind an `Arc`.
pub struct CaptureSession<P: CaptureProvider> {
    provider: P,
    settings: RecorderSettings,
    lifecycle: Mutex<Lifecycle>,
    // Kept apart from `lifecycle` so listeners can query `state()` from a
    // callback while a transition is in progress.
    current: Mutex<Option<Arc<AtomicBool>>>,
    listeners: Arc<ListenerRegistry>,
}

impl<P: CaptureProvider> CaptureSession<P> {
    pub fn new(provider: P) -> Self {
        Self::with_settings(provider, RecorderSettings::default())
    }

    pub fn with_settings(provider: P, settings: RecorderSettings) -> Self {
        Self {
            provider,
            settings,
            lifecycle: Mutex::new(Lifecycle::default()),
            current: Mutex::new(None),
            listeners: Arc::new(ListenerRegistry::default()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    /// Register for state notifications.
    ///
    /// Listeners may call `state()` but must not call `start` or `stop` from
    /// a callback.
    pub fn subscribe(&self, listener: Arc<dyn SessionListener>) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// `Recording` while the current session's writer is still draining.
    pub fn state(&self) -> SessionState {
        match &*self.current.lock() {
            Some(recording) => SessionState::from(recording.load(Ordering::SeqCst)),
            None => SessionState::Idle,
        }
    }

    /// Destination of the current session, if one is active.
    pub fn destination(&self) -> Option<PathBuf> {
        self.lifecycle.lock().active.as_ref().map(|a| a.destination.clone())
    }

    /// Start recording into `destination`.
    ///
    /// A running session is torn down first and its writer joined, so two
    /// writers never share a file. Fails with `ConfigurationFailed` when the
    /// authorization is missing and `OpenFailed` when the provider is
    /// unavailable or the stream cannot be opened; in all cases the
    /// controller stays idle and no file is created. A destination that
    /// cannot be written is reported by the writer through the log and
    /// `SessionListener::on_error`, not here.
    pub fn start(
        &self,
        authorization: Option<CaptureAuthorization>,
        destination: impl Into<PathBuf>,
        selectors: SelectorSet,
    ) -> Result<(), CaptureError> {
        let destination = destination.into();
        let mut lifecycle = self.lifecycle.lock();

        self.stop_locked(&mut lifecycle);
        for writer in lifecycle.retired.drain(..) {
            if writer.join().is_err() {
                log::error!("Previous writer thread panicked");
            }
        }

        if !self.provider.is_available() {
            return Err(CaptureError::OpenFailed(format!(
                "{} is not available on this device",
                self.provider.name()
            )));
        }

        let format = AudioFormat::PLAYBACK_CAPTURE;
        let buffer_size = frame_aligned_buffer(self.provider.min_buffer_size(&format)?, &format)?;

        let config = CaptureConfiguration::build(authorization, selectors)?;
        let degraded = config
            .selector_set()
            .is_degraded()
            .then(|| config.selector_set().requested().to_vec());
        let scoped = config.matching_selectors();

        let stream = self.provider.open(config, buffer_size).map_err(|e| {
            log::error!("{} could not open capture stream: {}", self.provider.name(), e);
            match e {
                CaptureError::OpenFailed(_) => e,
                other => CaptureError::OpenFailed(other.to_string()),
            }
        })?;

        if let Some(requested) = degraded {
            log::warn!("Cannot figure out selectors for {:?}; capturing unscoped", requested);
            self.listeners.degraded_match(&requested);
        }

        let id = Uuid::new_v4();
        log::info!(
            "Session {} recording to {} via {} (buffer {} bytes, selectors {:?})",
            id,
            destination.display(),
            self.provider.name(),
            buffer_size,
            scoped
        );

        let recording = Arc::new(AtomicBool::new(true));
        *self.current.lock() = Some(Arc::clone(&recording));
        self.listeners.state_changed(true);

        let spawned = spawn_writer(WriterContext {
            session_id: id,
            stream: Arc::clone(&stream),
            recording: Arc::clone(&recording),
            destination: destination.clone(),
            buffer_size,
            write_buffer_bytes: self.settings.write_buffer_bytes,
            format,
            started_at: Utc::now(),
            listeners: Arc::clone(&self.listeners),
        });

        let writer = match spawned {
            Ok(writer) => writer,
            Err(e) => {
                recording.store(false, Ordering::SeqCst);
                stream.close();
                *self.current.lock() = None;
                self.listeners.state_changed(false);
                return Err(e);
            }
        };

        lifecycle.active = Some(ActiveSession {
            id,
            destination,
            stream,
            recording,
            writer,
        });
        Ok(())
    }

    /// Signal the writer and close the stream. No-op while idle.
    ///
    /// Does not wait for the writer's final flush; see `wait_for_writer`.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        self.stop_locked(&mut lifecycle);
    }

    /// Join writers of stopped sessions, i.e. wait until their files are
    /// flushed and closed.
    pub fn wait_for_writer(&self) {
        let retired = std::mem::take(&mut self.lifecycle.lock().retired);
        for writer in retired {
            if writer.join().is_err() {
                log::error!("Writer thread panicked");
            }
        }
    }

    fn stop_locked(&self, lifecycle: &mut Lifecycle) {
        lifecycle.retired.retain(|writer| !writer.is_finished());

        let Some(active) = lifecycle.active.take() else {
            return;
        };

        if active.recording.swap(false, Ordering::SeqCst) {
            self.listeners.state_changed(false);
        }
        active.stream.close();
        *self.current.lock() = None;
        lifecycle.retired.push(active.writer);

        log::info!("Session {} stopped ({})", active.id, active.destination.display());
    }
}

/// Round the provider's minimum read size up to whole frames.
fn frame_aligned_buffer(min_bytes: usize, format: &AudioFormat) -> Result<usize, CaptureError> {
    let frame = format.bytes_per_frame();
    if min_bytes == 0 || frame == 0 {
        return Err(CaptureError::ConfigurationFailed(format!(
            "no viable buffer size for {:?}",
            format
        )));
    }
    Ok(min_bytes.div_ceil(frame) * frame)
}

impl<P: CaptureProvider> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        self.stop();
        self.wait_for_writer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::models::error::StreamError;
    use crate::models::recording_result::{RecordingResult, StopReason};
    use crate::streams::push_stream::PushStream;

    const CHUNK: usize = 64;

    /// Stream that serves `limit` reads of `CHUNK` bytes, then idles.
    struct ScriptedStream {
        reads: AtomicUsize,
        limit: usize,
        closes: AtomicUsize,
        closed: AtomicBool,
        odd_tail: bool,
        read_delay: Duration,
    }

    impl ScriptedStream {
        fn new(limit: usize) -> Self {
            Self {
                reads: AtomicUsize::new(0),
                limit,
                closes: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                odd_tail: false,
                read_delay: Duration::ZERO,
            }
        }
    }

    impl AudioInputStream for ScriptedStream {
        fn read(&self, buffer: &mut [u8]) -> Result<usize, StreamError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(StreamError::Closed);
            }
            if self.reads.load(Ordering::SeqCst) >= self.limit {
                thread::sleep(Duration::from_millis(2));
                return Err(StreamError::NotReady);
            }
            thread::sleep(self.read_delay);
            self.reads.fetch_add(1, Ordering::SeqCst);
            let n = if self.odd_tail { CHUNK - 1 } else { CHUNK }.min(buffer.len());
            buffer[..n].fill(0x11);
            Ok(n)
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    enum Script {
        Reads(usize),
        OddReads(usize),
        SlowReads(Duration),
        Push(Arc<PushStream>),
        Fail,
    }

    /// Provider handing out the scripted streams in order.
    struct FakeProvider {
        scripts: Mutex<Vec<Script>>,
        opened: Mutex<Vec<Arc<ScriptedStream>>>,
        open_calls: AtomicUsize,
        available: bool,
        min_buffer: Option<usize>,
    }

    impl FakeProvider {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts),
                opened: Mutex::new(Vec::new()),
                open_calls: AtomicUsize::new(0),
                available: true,
                min_buffer: None,
            }
        }

        fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }

        fn with_min_buffer(mut self, bytes: usize) -> Self {
            self.min_buffer = Some(bytes);
            self
        }

        fn stream(&self, index: usize) -> Arc<ScriptedStream> {
            Arc::clone(&self.opened.lock()[index])
        }
    }

    impl CaptureProvider for FakeProvider {
        fn is_available(&self) -> bool {
            self.available
        }

        fn min_buffer_size(&self, format: &AudioFormat) -> Result<usize, CaptureError> {
            match self.min_buffer {
                Some(bytes) => Ok(bytes),
                None => Ok(format.bytes_for(crate::traits::capture_provider::DEFAULT_MIN_BUFFER)),
            }
        }

        fn open(
            &self,
            config: CaptureConfiguration,
            _buffer_size: usize,
        ) -> Result<Arc<dyn AudioInputStream>, CaptureError> {
            self.open_calls.fetch_add(1, Ordering::SeqCst);
            if config.authorization().is_revoked() {
                return Err(CaptureError::OpenFailed("authorization revoked".into()));
            }
            let script = {
                let mut scripts = self.scripts.lock();
                if scripts.is_empty() {
                    Script::Reads(usize::MAX)
                } else {
                    scripts.remove(0)
                }
            };
            match script {
                Script::Reads(limit) => {
                    let stream = Arc::new(ScriptedStream::new(limit));
                    self.opened.lock().push(Arc::clone(&stream));
                    Ok(stream)
                }
                Script::OddReads(limit) => {
                    let mut stream = ScriptedStream::new(limit);
                    stream.odd_tail = true;
                    let stream = Arc::new(stream);
                    self.opened.lock().push(Arc::clone(&stream));
                    Ok(stream)
                }
                Script::SlowReads(delay) => {
                    let mut stream = ScriptedStream::new(usize::MAX);
                    stream.read_delay = delay;
                    let stream = Arc::new(stream);
                    self.opened.lock().push(Arc::clone(&stream));
                    Ok(stream)
                }
                Script::Push(stream) => Ok(stream),
                Script::Fail => Err(CaptureError::DeviceNotAvailable),
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<bool>>,
        degraded: Mutex<Vec<Vec<String>>>,
        errors: Mutex<Vec<CaptureError>>,
        finished: Mutex<Vec<RecordingResult>>,
    }

    impl SessionListener for Recorder {
        fn on_state_changed(&self, recording: bool) {
            self.states.lock().push(recording);
        }

        fn on_degraded_match(&self, requested: &[String]) {
            self.degraded.lock().push(requested.to_vec());
        }

        fn on_error(&self, error: &CaptureError) {
            self.errors.lock().push(error.clone());
        }

        fn on_capture_finished(&self, result: &RecordingResult) {
            self.finished.lock().push(result.clone());
        }
    }

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("playback_capture_session_{}_{}", Uuid::new_v4(), name))
    }

    fn auth() -> Option<CaptureAuthorization> {
        Some(CaptureAuthorization::new("grant"))
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn stop_while_idle_is_noop() {
        let session = CaptureSession::new(FakeProvider::new(vec![]));
        let recorder = Arc::new(Recorder::default());
        session.subscribe(recorder.clone());

        for _ in 0..3 {
            session.stop();
            assert_eq!(session.state(), SessionState::Idle);
        }
        assert!(recorder.states.lock().is_empty());
        assert_eq!(session.provider().open_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn repeated_stop_touches_stream_once() {
        let path = temp_file_path("repeat_stop.pcm");
        let session = CaptureSession::new(FakeProvider::new(vec![Script::Reads(1)]));
        session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap();

        session.stop();
        session.stop();
        session.stop();
        session.wait_for_writer();

        assert_eq!(session.provider().stream(0).closes.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Idle);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn stop_after_n_reads_bounds_file_size() {
        let path = temp_file_path("scenario_a.pcm");
        let reads = 5;
        let session = CaptureSession::new(FakeProvider::new(vec![Script::Reads(reads)]));
        session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap();
        assert_eq!(session.state(), SessionState::Recording);

        let stream = session.provider().stream(0);
        wait_until(|| stream.reads.load(Ordering::SeqCst) >= reads);
        session.stop();
        session.wait_for_writer();

        let size = fs::metadata(&path).unwrap().len() as usize;
        let buffer_size = session
            .provider()
            .min_buffer_size(&AudioFormat::PLAYBACK_CAPTURE)
            .unwrap();
        assert_eq!(size % AudioFormat::PLAYBACK_CAPTURE.bytes_per_sample(), 0);
        assert!(size <= reads * buffer_size);
        assert_eq!(size, reads * CHUNK);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn odd_reads_keep_file_sample_aligned() {
        let path = temp_file_path("odd.pcm");
        let session = CaptureSession::new(FakeProvider::new(vec![Script::OddReads(3)]));
        session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap();

        let stream = session.provider().stream(0);
        wait_until(|| stream.reads.load(Ordering::SeqCst) >= 3);
        session.stop();
        session.wait_for_writer();

        let size = fs::metadata(&path).unwrap().len() as usize;
        assert_eq!(size % 2, 0);
        assert_eq!(size, 3 * (CHUNK - 1) - 1);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn no_bytes_appended_after_writer_joined() {
        let path = temp_file_path("bounded.pcm");
        let session = CaptureSession::new(FakeProvider::new(vec![Script::Reads(usize::MAX)]));
        session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap();

        let stream = session.provider().stream(0);
        wait_until(|| stream.reads.load(Ordering::SeqCst) >= 10);
        session.stop();
        session.wait_for_writer();

        let reads_at_stop = stream.reads.load(Ordering::SeqCst);
        let size = fs::metadata(&path).unwrap().len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(stream.reads.load(Ordering::SeqCst), reads_at_stop);
        assert_eq!(fs::metadata(&path).unwrap().len(), size);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn start_while_recording_replaces_session() {
        let first = temp_file_path("first.pcm");
        let second = temp_file_path("second.pcm");
        let session = CaptureSession::new(FakeProvider::new(vec![
            Script::Reads(usize::MAX),
            Script::Reads(usize::MAX),
        ]));
        let recorder = Arc::new(Recorder::default());
        session.subscribe(recorder.clone());

        session.start(auth(), first.clone(), SelectorSet::unscoped()).unwrap();
        session.start(auth(), second.clone(), SelectorSet::unscoped()).unwrap();

        let old = session.provider().stream(0);
        assert!(old.is_closed());
        assert_eq!(old.closes.load(Ordering::SeqCst), 1);
        assert!(!session.provider().stream(1).is_closed());
        assert_eq!(session.destination(), Some(second.clone()));
        assert_eq!(session.state(), SessionState::Recording);

        // The first writer was joined by the second start.
        assert_eq!(recorder.finished.lock().len(), 1);
        assert_eq!(*recorder.states.lock(), vec![true, false, true]);

        session.stop();
        session.wait_for_writer();
        assert_eq!(recorder.finished.lock().len(), 2);
        fs::remove_file(&first).ok();
        fs::remove_file(&second).ok();
    }

    #[test]
    fn restart_on_same_file_never_overlaps_writers() {
        let path = temp_file_path("same.pcm");
        let session = CaptureSession::new(FakeProvider::new(vec![Script::Reads(4), Script::Reads(2)]));

        session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap();
        let first = session.provider().stream(0);
        wait_until(|| first.reads.load(Ordering::SeqCst) >= 4);

        session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap();
        let second = session.provider().stream(1);
        wait_until(|| second.reads.load(Ordering::SeqCst) >= 2);
        session.stop();
        session.wait_for_writer();

        // Second session truncated the file and only its bytes remain.
        assert_eq!(fs::metadata(&path).unwrap().len() as usize, 2 * CHUNK);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_authorization_keeps_idle() {
        let path = temp_file_path("no_auth.pcm");
        let session = CaptureSession::new(FakeProvider::new(vec![]));

        let err = session.start(None, path.clone(), SelectorSet::unscoped()).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.provider().open_calls.load(Ordering::SeqCst), 0);
        assert!(!path.exists());
    }

    #[test]
    fn revoked_authorization_fails_open_without_file() {
        let path = temp_file_path("revoked.pcm");
        let session = CaptureSession::new(FakeProvider::new(vec![]));
        let recorder = Arc::new(Recorder::default());
        session.subscribe(recorder.clone());

        let authorization = CaptureAuthorization::new("grant");
        authorization.revoker().revoke();
        let err = session
            .start(Some(authorization), path.clone(), SelectorSet::unscoped())
            .unwrap_err();

        assert!(matches!(err, CaptureError::OpenFailed(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!path.exists());
        assert!(recorder.states.lock().is_empty());
    }

    #[test]
    fn provider_errors_surface_as_open_failed() {
        let session = CaptureSession::new(FakeProvider::new(vec![Script::Fail]));
        let err = session
            .start(auth(), temp_file_path("fail.pcm"), SelectorSet::unscoped())
            .unwrap_err();
        assert_eq!(err, CaptureError::OpenFailed("device not available".into()));
    }

    #[test]
    fn degraded_selectors_still_record() {
        let path = temp_file_path("degraded.pcm");
        let session = CaptureSession::new(FakeProvider::new(vec![Script::Reads(2)]));
        let recorder = Arc::new(Recorder::default());
        session.subscribe(recorder.clone());

        let resolver = crate::storage::app_registry::AppRegistry::default();
        let selectors = SelectorSet::resolve(&resolver, &["com.missing".to_string()]);
        session.start(auth(), path.clone(), selectors).unwrap();

        let stream = session.provider().stream(0);
        wait_until(|| stream.reads.load(Ordering::SeqCst) >= 2);
        session.stop();
        session.wait_for_writer();

        assert_eq!(*recorder.degraded.lock(), vec![vec!["com.missing".to_string()]]);
        assert!(fs::metadata(&path).unwrap().len() > 0);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn unwritable_destination_is_reported_not_returned() {
        let dir = temp_file_path("dest_dir");
        fs::create_dir_all(&dir).unwrap();
        let session = CaptureSession::new(FakeProvider::new(vec![Script::Reads(usize::MAX)]));
        let recorder = Arc::new(Recorder::default());
        session.subscribe(recorder.clone());

        // A directory cannot be opened as the destination file.
        session.start(auth(), dir.clone(), SelectorSet::unscoped()).unwrap();
        wait_until(|| !recorder.errors.lock().is_empty());

        assert!(matches!(recorder.errors.lock()[0], CaptureError::WriteFailed(_)));
        assert!(session.provider().stream(0).is_closed());
        assert_eq!(*recorder.states.lock(), vec![true, false]);
        session.stop();
        session.wait_for_writer();
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn stream_death_ends_recording() {
        let path = temp_file_path("dead.pcm");
        let push = Arc::new(PushStream::new(1024, Duration::from_millis(10)));
        let session = CaptureSession::new(FakeProvider::new(vec![Script::Push(Arc::clone(&push))]));
        let recorder = Arc::new(Recorder::default());
        session.subscribe(recorder.clone());

        session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap();
        push.push(&[1, 2, 3, 4]);
        push.fail("endpoint invalidated");
        wait_until(|| !recorder.finished.lock().is_empty());

        assert_eq!(session.state(), SessionState::Idle);
        let result = recorder.finished.lock()[0].clone();
        assert_eq!(result.stop_reason, StopReason::StreamEnded);
        assert_eq!(result.bytes_written, 8);
        assert_eq!(
            recorder.errors.lock()[0],
            CaptureError::StreamLost("endpoint invalidated".into())
        );
        session.stop();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn push_stream_session_records_pushed_samples() {
        let path = temp_file_path("push.pcm");
        let push = Arc::new(PushStream::new(4096, Duration::from_millis(10)));
        let session = CaptureSession::new(FakeProvider::new(vec![Script::Push(Arc::clone(&push))]));
        let recorder = Arc::new(Recorder::default());
        session.subscribe(recorder.clone());

        session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap();
        push.push(&[100, -100, 200, -200]);
        wait_until(|| push.buffered_samples() == 0);
        thread::sleep(Duration::from_millis(20));
        session.stop();
        session.wait_for_writer();

        let bytes = fs::read(&path).unwrap();
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![100, -100, 200, -200]);

        let result = recorder.finished.lock()[0].clone();
        assert_eq!(result.stop_reason, StopReason::Requested);
        assert_eq!(result.bytes_written, 8);
        assert_eq!(*recorder.states.lock(), vec![true, false]);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn drop_stops_active_session() {
        let path = temp_file_path("drop.pcm");
        let provider_stream;
        {
            let session = CaptureSession::new(FakeProvider::new(vec![Script::Reads(usize::MAX)]));
            session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap();
            provider_stream = session.provider().stream(0);
        }
        assert!(provider_stream.is_closed());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn unavailable_provider_is_never_opened() {
        let path = temp_file_path("unavailable.pcm");
        let session = CaptureSession::new(FakeProvider::new(vec![]).unavailable());

        let err = session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap_err();
        assert!(matches!(err, CaptureError::OpenFailed(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.provider().open_calls.load(Ordering::SeqCst), 0);
        assert!(!path.exists());
    }

    #[test]
    fn sub_frame_min_buffer_is_rounded_up() {
        let path = temp_file_path("tiny_buffer.pcm");
        let session = CaptureSession::new(FakeProvider::new(vec![Script::Reads(3)]).with_min_buffer(1));
        session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap();

        let stream = session.provider().stream(0);
        wait_until(|| stream.reads.load(Ordering::SeqCst) >= 3);
        session.stop();
        session.wait_for_writer();

        // One 16-bit frame per read.
        assert_eq!(fs::metadata(&path).unwrap().len(), 6);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn zero_min_buffer_is_rejected() {
        let session = CaptureSession::new(FakeProvider::new(vec![]).with_min_buffer(0));
        let err = session
            .start(auth(), temp_file_path("zero.pcm"), SelectorSet::unscoped())
            .unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
        assert_eq!(session.provider().open_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn degraded_match_not_reported_when_open_fails() {
        let session = CaptureSession::new(FakeProvider::new(vec![]));
        let recorder = Arc::new(Recorder::default());
        session.subscribe(recorder.clone());

        let authorization = CaptureAuthorization::new("grant");
        authorization.revoker().revoke();
        let resolver = crate::storage::app_registry::AppRegistry::default();
        let selectors = SelectorSet::resolve(&resolver, &["com.missing".to_string()]);
        let err = session
            .start(Some(authorization), temp_file_path("never.pcm"), selectors)
            .unwrap_err();

        assert!(matches!(err, CaptureError::OpenFailed(_)));
        assert!(recorder.degraded.lock().is_empty());
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn failed_write_ends_recording_without_retry() {
        let settings = RecorderSettings {
            write_buffer_bytes: 2 * CHUNK,
            ..RecorderSettings::default()
        };
        let session = CaptureSession::with_settings(FakeProvider::new(vec![Script::Reads(usize::MAX)]), settings);
        let recorder = Arc::new(Recorder::default());
        session.subscribe(recorder.clone());

        // /dev/full opens fine and fails the first write that reaches it.
        session.start(auth(), "/dev/full", SelectorSet::unscoped()).unwrap();
        wait_until(|| !recorder.finished.lock().is_empty());

        let stream = session.provider().stream(0);
        let reads = stream.reads.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(stream.reads.load(Ordering::SeqCst), reads);
        assert!(stream.is_closed());
        assert_eq!(session.state(), SessionState::Idle);

        assert_eq!(recorder.errors.lock().len(), 1);
        assert!(matches!(recorder.errors.lock()[0], CaptureError::WriteFailed(_)));
        let result = recorder.finished.lock()[0].clone();
        assert_eq!(result.stop_reason, StopReason::WriteFailed);
        assert_eq!(result.bytes_written, 0);
        assert_eq!(result.checksum, None);
        assert_eq!(*recorder.states.lock(), vec![true, false]);
    }

    #[test]
    fn drop_waits_for_final_flush() {
        let path = temp_file_path("drop_flush.pcm");
        let recorder = Arc::new(Recorder::default());
        let session = CaptureSession::new(FakeProvider::new(vec![Script::SlowReads(Duration::from_millis(40))]));
        session.subscribe(recorder.clone());
        session.start(auth(), path.clone(), SelectorSet::unscoped()).unwrap();

        let stream = session.provider().stream(0);
        wait_until(|| stream.reads.load(Ordering::SeqCst) >= 1);
        drop(session);

        let finished = recorder.finished.lock();
        assert_eq!(finished.len(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), finished[0].bytes_written);
        drop(finished);
        fs::remove_file(&path).ok();
    }
}
