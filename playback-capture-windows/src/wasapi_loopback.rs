//! WASAPI loopback capture provider for device playback.
//!
//! Captures the audio mix going to the default render endpoint using
//! `AUDCLNT_STREAMFLAGS_LOOPBACK`. No special permissions needed on Windows.
//!
//! Loopback sees the endpoint mix, not individual applications, so a scoped
//! configuration is recorded unscoped. DRM-protected audio is silenced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use windows::core::PCWSTR;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use playback_capture_core::models::config::CaptureConfiguration;
use playback_capture_core::models::error::CaptureError;
use playback_capture_core::models::format::AudioFormat;
use playback_capture_core::models::settings::RecorderSettings;
use playback_capture_core::processing::pcm;
use playback_capture_core::streams::push_stream::PushStream;
use playback_capture_core::traits::audio_stream::AudioInputStream;
use playback_capture_core::traits::capture_provider::CaptureProvider;

/// WASAPI loopback backend for `CaptureSession`.
///
/// Every `open` starts a dedicated capture thread feeding a `PushStream`;
/// closing that stream stops the thread.
pub struct WasapiLoopbackProvider {
    push_buffer_secs: f64,
    poll_timeout: Duration,
    capture_threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl WasapiLoopbackProvider {
    pub fn new(settings: &RecorderSettings) -> Self {
        Self {
            push_buffer_secs: settings.push_buffer_secs,
            poll_timeout: settings.stream_poll_interval(),
            capture_threads: Mutex::new(Vec::new()),
        }
    }
}

impl Default for WasapiLoopbackProvider {
    fn default() -> Self {
        Self::new(&RecorderSettings::default())
    }
}

impl CaptureProvider for WasapiLoopbackProvider {
    fn is_available(&self) -> bool {
        // WASAPI loopback is always available on Windows Vista+
        true
    }

    fn open(
        &self,
        config: CaptureConfiguration,
        buffer_size: usize,
    ) -> Result<Arc<dyn AudioInputStream>, CaptureError> {
        if config.authorization().is_revoked() {
            return Err(CaptureError::OpenFailed("capture authorization was revoked".into()));
        }
        if config.is_scoped() {
            log::warn!(
                "Loopback cannot filter by selector {:?}; capturing the whole endpoint mix",
                config.matching_selectors()
            );
        }

        let format = config.format();
        let stream = Arc::new(PushStream::for_format(&format, self.push_buffer_secs, self.poll_timeout));
        let running = Arc::new(AtomicBool::new(true));
        {
            let running = Arc::clone(&running);
            stream.on_close(move || running.store(false, Ordering::SeqCst));
        }

        let (init_tx, init_rx) = mpsc::channel();
        let feed = Arc::clone(&stream);
        let handle = thread::Builder::new()
            .name("wasapi-loopback-capture".into())
            .spawn(move || {
                if let Err(e) = loopback_capture_loop(running, &feed, format, init_tx) {
                    log::error!("Loopback capture error: {}", e);
                    match e {
                        CaptureError::StreamLost(reason) => feed.fail(reason),
                        other => feed.fail(other.to_string()),
                    }
                }
            })
            .map_err(|e| CaptureError::OpenFailed(format!("failed to spawn loopback thread: {}", e)))?;

        match init_rx.recv() {
            Ok(Ok(())) => {
                log::debug!("Loopback capture started (reads of {} bytes)", buffer_size);
                let mut threads = self.capture_threads.lock();
                threads.retain(|t| !t.is_finished());
                threads.push(handle);
                Ok(stream)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(CaptureError::OpenFailed(e.to_string()))
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::OpenFailed("loopback thread exited during initialisation".into()))
            }
        }
    }

    fn name(&self) -> &str {
        "WASAPI loopback"
    }
}

impl Drop for WasapiLoopbackProvider {
    fn drop(&mut self) {
        // Threads exit once their stream is closed.
        for handle in self.capture_threads.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

/// Main loopback capture loop running on a dedicated thread.
///
/// Sequence:
/// 1. CoInitializeEx (MTA)
/// 2. Get default render endpoint
/// 3. Activate IAudioClient
/// 4. Initialize with LOOPBACK flag in shared mode
/// 5. Get IAudioCaptureClient, report init result to `open`
/// 6. Register with MMCSS
/// 7. Start, poll for buffers, convert to `target` and push
fn loopback_capture_loop(
    running: Arc<AtomicBool>,
    stream: &PushStream,
    target: AudioFormat,
    init_tx: mpsc::Sender<Result<(), CaptureError>>,
) -> Result<(), CaptureError> {
    let session = match LoopbackClient::initialize() {
        Ok(session) => {
            let _ = init_tx.send(Ok(()));
            session
        }
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return Ok(());
        }
    };
    session.run(&running, stream, target)
}

/// COM objects of one loopback session. Confined to the capture thread.
struct LoopbackClient {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    sample_rate: f64,
    channels: usize,
    // Dropped last: COM must outlive the interfaces above.
    _com_guard: CoUninitializeGuard,
}

impl LoopbackClient {
    fn initialize() -> Result<Self, CaptureError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| CaptureError::Unknown(format!("CoInitializeEx failed: {}", e)))?;
            let com_guard = CoUninitializeGuard;

            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(|_| CaptureError::DeviceNotAvailable)?;

            // Loopback reads from the RENDER endpoint
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|_| CaptureError::DeviceNotAvailable)?;

            let audio_client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| CaptureError::ConfigurationFailed(format!("Activate failed: {}", e)))?;

            let mix_format_ptr = audio_client
                .GetMixFormat()
                .map_err(|e| CaptureError::ConfigurationFailed(format!("GetMixFormat failed: {}", e)))?;

            let (sample_rate, channels, bits) = {
                let mix_format = &*mix_format_ptr;
                (
                    f64::from(mix_format.nSamplesPerSec),
                    usize::from(mix_format.nChannels),
                    mix_format.wBitsPerSample,
                )
            };

            // Shared-mode mix format is 32-bit float
            if bits != 32 || channels == 0 {
                CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
                return Err(CaptureError::ConfigurationFailed(format!(
                    "unsupported mix format: {} channels, {} bits",
                    channels, bits
                )));
            }

            let buffer_duration = 1_000_000; // 100ms in 100ns units
            let initialized = audio_client.Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_NOPERSIST,
                buffer_duration,
                0,
                mix_format_ptr,
                None,
            );
            CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
            initialized.map_err(|e| {
                CaptureError::ConfigurationFailed(format!("IAudioClient::Initialize (loopback) failed: {}", e))
            })?;

            let capture_client: IAudioCaptureClient = audio_client
                .GetService()
                .map_err(|e| CaptureError::ConfigurationFailed(format!("GetService failed: {}", e)))?;

            log::info!(
                "Loopback endpoint mix format: {} Hz, {} channels",
                sample_rate,
                channels
            );

            Ok(Self {
                audio_client,
                capture_client,
                sample_rate,
                channels,
                _com_guard: com_guard,
            })
        }
    }

    fn run(&self, running: &AtomicBool, stream: &PushStream, target: AudioFormat) -> Result<(), CaptureError> {
        // Carries phase across packets.
        let mut resampler = pcm::Resampler::new(self.sample_rate, f64::from(target.sample_rate));

        unsafe {
            // MMCSS registration for real-time priority
            let mut task_index: u32 = 0;
            let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
            let _mmcss_handle = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index);

            self.audio_client
                .Start()
                .map_err(|e| CaptureError::Unknown(format!("IAudioClient::Start failed: {}", e)))?;

            // Poll every 10ms until the stream is closed
            let result = (|| {
                while running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(10));

                    let mut packet_length = self
                        .capture_client
                        .GetNextPacketSize()
                        .map_err(|e| CaptureError::StreamLost(format!("GetNextPacketSize failed: {}", e)))?;

                    while packet_length > 0 {
                        let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                        let mut num_frames: u32 = 0;
                        let mut flags: u32 = 0;

                        self.capture_client
                            .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                            .map_err(|e| CaptureError::StreamLost(format!("GetBuffer failed: {}", e)))?;

                        if num_frames > 0 && !buffer_ptr.is_null() {
                            let total_samples = num_frames as usize * self.channels;
                            let mono = if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                                vec![0.0f32; num_frames as usize]
                            } else {
                                let samples = std::slice::from_raw_parts(buffer_ptr as *const f32, total_samples);
                                pcm::downmix_to_mono(samples, self.channels)
                            };
                            let resampled = resampler.process(&mono);
                            stream.push(&pcm::f32_to_i16(&resampled));
                        }

                        self.capture_client
                            .ReleaseBuffer(num_frames)
                            .map_err(|e| CaptureError::StreamLost(format!("ReleaseBuffer failed: {}", e)))?;

                        packet_length = self
                            .capture_client
                            .GetNextPacketSize()
                            .map_err(|e| CaptureError::StreamLost(format!("GetNextPacketSize failed: {}", e)))?;
                    }
                }
                Ok(())
            })();

            let _ = self.audio_client.Stop();
            result
        }
    }
}

struct CoUninitializeGuard;

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
