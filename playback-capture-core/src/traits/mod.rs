pub mod audio_stream;
pub mod capture_provider;
pub mod selector_resolver;
pub mod session_listener;
