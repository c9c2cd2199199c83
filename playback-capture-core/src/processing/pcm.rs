//! Adaptation of a device mix format into the fixed capture format.
//!
//! Callback backends usually deliver interleaved `f32` at the endpoint's own
//! rate and channel count; these helpers turn that into mono `i16` samples.

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Streaming linear-interpolation resampler for mono audio.
///
/// Keeps the fractional source position and the last input sample between
/// calls, so feeding a stream packet by packet produces the same output as
/// resampling it in one piece, with no drift from per-packet rounding.
#[derive(Debug, Clone)]
pub struct Resampler {
    /// Source samples advanced per output sample.
    step: f64,
    /// Position of the next output, relative to `last` (or to the first
    /// sample of the next packet when there is no `last` yet).
    position: f64,
    last: Option<f32>,
    passthrough: bool,
}

impl Resampler {
    pub fn new(source_sample_rate: f64, target_sample_rate: f64) -> Self {
        let passthrough = (source_sample_rate - target_sample_rate).abs() < 0.01
            || source_sample_rate <= 0.0
            || target_sample_rate <= 0.0;
        Self {
            step: if passthrough { 1.0 } else { source_sample_rate / target_sample_rate },
            position: 0.0,
            last: None,
            passthrough,
        }
    }

    /// Resample the next packet. Returns input unchanged if rates match.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        if self.passthrough || samples.is_empty() {
            return samples.to_vec();
        }

        let carried = usize::from(self.last.is_some());
        let len = samples.len() + carried;
        let at = |i: usize| match self.last {
            Some(last) if i == 0 => last,
            _ => samples[i - carried],
        };

        let mut output = Vec::with_capacity((samples.len() as f64 / self.step) as usize + 1);
        let mut position = self.position;
        while position + 1.0 < len as f64 {
            let index = position as usize;
            let fraction = (position - index as f64) as f32;
            output.push(at(index) * (1.0 - fraction) + at(index + 1) * fraction);
            position += self.step;
        }

        self.position = position - (len - 1) as f64;
        self.last = samples.last().copied();
        output
    }
}

/// Convert f32 samples `[-1.0, 1.0]` to 16-bit PCM, clamping out-of-range values.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}
