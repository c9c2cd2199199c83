pub mod controller;
pub mod listeners;
pub mod request;
pub mod service;
pub(crate) mod writer;
