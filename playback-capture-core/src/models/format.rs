use std::time::Duration;

/// Linear PCM layout of the captured stream.
///
/// The persisted file carries no header, so readers must know this layout
/// out of band. Sample byte order is platform native.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// Mono, 16-bit, 44.1 kHz.
    pub const PLAYBACK_CAPTURE: AudioFormat = AudioFormat {
        sample_rate: 44_100,
        channels: 1,
        bits_per_sample: 16,
    };

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Width of one frame on disk; every write keeps the file a multiple of it.
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.channels)
    }

    pub fn byte_rate(&self) -> u64 {
        u64::from(self.sample_rate) * self.bytes_per_frame() as u64
    }

    /// Bytes for `duration` of audio, rounded down to whole frames.
    pub fn bytes_for(&self, duration: Duration) -> usize {
        let frames = (f64::from(self.sample_rate) * duration.as_secs_f64()) as usize;
        frames * self.bytes_per_frame()
    }

    /// Playback time represented by `bytes` of audio in this format.
    pub fn duration_of(&self, bytes: u64) -> f64 {
        let rate = self.byte_rate();
        if rate == 0 {
            return 0.0;
        }
        bytes as f64 / rate as f64
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::PLAYBACK_CAPTURE
    }
}
