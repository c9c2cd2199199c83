use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::error::StreamError;
use crate::models::format::AudioFormat;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::audio_stream::AudioInputStream;

const OVERFLOW_WARN_INTERVAL: Duration = Duration::from_secs(1);
const COPY_CHUNK: usize = 256;

type CloseHook = Box<dyn FnOnce() + Send>;

struct PushState {
    ring: RingBuffer<i16>,
    closed: bool,
    failure: Option<String>,
    dropped: u64,
    last_overflow_warn: Option<Instant>,
    on_close: Option<CloseHook>,
}

/// Input stream fed by a callback-driven audio backend.
///
/// The producer (`push`) never blocks, so it is safe to call from a
/// real-time audio thread. When the reader falls behind, the oldest samples
/// are dropped and counted. The reader (`read`) blocks up to the poll
/// timeout and then reports `NotReady` so it can re-check its stop flag.
///
/// ```text
/// [backend callback] --push--> [RingBuffer<i16>] --read--> [writer thread]
/// ```
pub struct PushStream {
    state: Mutex<PushState>,
    data_ready: Condvar,
    poll_timeout: Duration,
}

impl PushStream {
    pub fn new(capacity_samples: usize, poll_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(PushState {
                ring: RingBuffer::new(capacity_samples),
                closed: false,
                failure: None,
                dropped: 0,
                last_overflow_warn: None,
                on_close: None,
            }),
            data_ready: Condvar::new(),
            poll_timeout,
        }
    }

    /// Stream holding `buffer_secs` of `format` audio.
    pub fn for_format(format: &AudioFormat, buffer_secs: f64, poll_timeout: Duration) -> Self {
        let samples_per_sec = f64::from(format.sample_rate) * f64::from(format.channels);
        Self::new((samples_per_sec * buffer_secs) as usize, poll_timeout)
    }

    /// Run `hook` exactly once, on the first `close`.
    ///
    /// Backends use it to stop their capture thread.
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            hook();
            return;
        }
        state.on_close = Some(Box::new(hook));
    }

    /// Append samples. Returns `false` once the stream is closed or failed,
    /// telling the producer to stop.
    pub fn push(&self, samples: &[i16]) -> bool {
        let mut state = self.state.lock();
        if state.closed || state.failure.is_some() {
            return false;
        }

        let dropped = state.ring.write(samples);
        if dropped > 0 {
            state.dropped += dropped as u64;
            let warn_due = state
                .last_overflow_warn
                .map_or(true, |at| at.elapsed() >= OVERFLOW_WARN_INTERVAL);
            if warn_due {
                log::warn!(
                    "Capture reader is falling behind: dropped {} samples ({} total)",
                    dropped,
                    state.dropped
                );
                state.last_overflow_warn = Some(Instant::now());
            }
        }
        drop(state);

        self.data_ready.notify_one();
        true
    }

    /// Mark the stream dead. Buffered samples are still drained, then reads
    /// fail with `StreamError::Dead`.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut state = self.state.lock();
        if state.failure.is_none() {
            state.failure = Some(reason.into());
        }
        drop(state);
        self.data_ready.notify_all();
    }

    /// Total samples discarded because the reader fell behind.
    pub fn dropped_samples(&self) -> u64 {
        self.state.lock().dropped
    }

    pub fn buffered_samples(&self) -> usize {
        self.state.lock().ring.count()
    }
}

impl AudioInputStream for PushStream {
    fn read(&self, buffer: &mut [u8]) -> Result<usize, StreamError> {
        let max_samples = buffer.len() / 2;
        if max_samples == 0 {
            return Ok(0);
        }

        let mut state = self.state.lock();
        if state.ring.is_empty() && !state.closed && state.failure.is_none() {
            self.data_ready.wait_for(&mut state, self.poll_timeout);
        }

        if state.ring.is_empty() {
            if let Some(reason) = &state.failure {
                return Err(StreamError::Dead(reason.clone()));
            }
            if state.closed {
                return Err(StreamError::Closed);
            }
            return Err(StreamError::NotReady);
        }

        let count = state.ring.count().min(max_samples);
        let mut chunk = [0i16; COPY_CHUNK];
        let mut copied = 0;
        while copied < count {
            let n = state.ring.read_into(&mut chunk[..(count - copied).min(COPY_CHUNK)]);
            for (i, sample) in chunk[..n].iter().enumerate() {
                let offset = (copied + i) * 2;
                buffer[offset..offset + 2].copy_from_slice(&sample.to_ne_bytes());
            }
            copied += n;
        }
        Ok(copied * 2)
    }

    fn close(&self) {
        let hook = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.on_close.take()
        };
        self.data_ready.notify_all();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
