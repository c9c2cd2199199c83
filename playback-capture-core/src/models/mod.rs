pub mod authorization;
pub mod config;
pub mod error;
pub mod format;
pub mod recording_result;
pub mod selectors;
pub mod settings;
pub mod state;
