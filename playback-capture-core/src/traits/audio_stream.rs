use crate::models::error::StreamError;

/// An open device input stream bound to one capture configuration.
///
/// Shared as `Arc<dyn AudioInputStream>` between the controller, which owns
/// its lifetime and closes it, and the writer thread, which is its only
/// reader. `close` may therefore race with an in-flight `read`.
pub trait AudioInputStream: Send + Sync {
    /// Block until samples are available and copy them into `buffer`.
    ///
    /// Returns the number of bytes copied. `Ok(0)` and
    /// `Err(StreamError::NotReady)` both mean "no data yet"; any other error
    /// means the stream is gone and the reader must stop.
    fn read(&self, buffer: &mut [u8]) -> Result<usize, StreamError>;

    /// Stop the underlying capture. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}
