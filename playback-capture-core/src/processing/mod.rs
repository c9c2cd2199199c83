pub mod pcm;
pub mod ring_buffer;
