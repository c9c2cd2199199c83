pub mod app_registry;
pub mod pcm_writer;
