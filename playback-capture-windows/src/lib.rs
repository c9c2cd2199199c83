//! # playback-capture-windows
//!
//! Windows WASAPI backend for playback-capture.
//!
//! Provides:
//! - `WasapiLoopbackProvider` — device playback capture via WASAPI loopback on the default render endpoint
//!
//! ## Platform Requirements
//! - Windows 10 1703+ (build 15063)
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use playback_capture_core::{CaptureAuthorization, CaptureSession, SelectorSet};
//! use playback_capture_windows::WasapiLoopbackProvider;
//!
//! let session = CaptureSession::new(WasapiLoopbackProvider::default());
//! session.start(Some(CaptureAuthorization::new("consent")), "take.pcm", SelectorSet::unscoped())?;
//! // ...
//! session.stop();
//! ```

#[cfg(target_os = "windows")]
pub mod wasapi_loopback;

#[cfg(target_os = "windows")]
pub use wasapi_loopback::WasapiLoopbackProvider;
