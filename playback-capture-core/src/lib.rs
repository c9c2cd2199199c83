//! # playback-capture-core
//!
//! Platform-agnostic playback capture core library.
//!
//! Records what the device is playing (optionally restricted to selected
//! applications) into a raw 16-bit mono 44.1kHz PCM file. Platform-specific
//! backends (Windows WASAPI loopback) implement the `CaptureProvider` trait
//! and plug into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! playback-capture-core (this crate)
//! ├── traits/       ← CaptureProvider, AudioInputStream, SelectorResolver, SessionListener
//! ├── models/       ← CaptureError, SessionState, CaptureConfiguration, SelectorSet, settings
//! ├── processing/   ← RingBuffer, PCM downmix / resample / conversion
//! ├── streams/      ← PushStream (callback-fed AudioInputStream)
//! ├── session/      ← CaptureSession (idle ⇄ recording), writer thread, CaptureService
//! └── storage/      ← PcmFileWriter, AppRegistry
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod streams;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::authorization::{AuthorizationRevoker, CaptureAuthorization};
pub use models::config::CaptureConfiguration;
pub use models::error::{CaptureError, StreamError};
pub use models::format::AudioFormat;
pub use models::recording_result::{RecordingResult, StopReason};
pub use models::selectors::{SelectorSet, UsageClass};
pub use models::settings::RecorderSettings;
pub use models::state::SessionState;
pub use processing::ring_buffer::RingBuffer;
pub use session::controller::CaptureSession;
pub use session::listeners::SubscriptionId;
pub use session::request::SessionRequest;
pub use session::service::CaptureService;
pub use storage::app_registry::{AppRegistry, InstalledApp};
pub use storage::pcm_writer::PcmFileWriter;
pub use streams::push_stream::PushStream;
pub use traits::audio_stream::AudioInputStream;
pub use traits::capture_provider::CaptureProvider;
pub use traits::selector_resolver::SelectorResolver;
pub use traits::session_listener::SessionListener;
