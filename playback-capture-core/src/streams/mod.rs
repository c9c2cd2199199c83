pub mod push_stream;
