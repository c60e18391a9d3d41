//! Normalization of raw capture audio: channel downmix, resampling, and
//! level measurement.
//!
//! Everything here is pure sample math; the capture engine feeds it from the
//! consumer thread, never from the real-time callback.

use crate::defaults;

/// Mix interleaved multi-channel audio to mono by averaging channels.
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler that carries state across chunks.
///
/// The read position is tracked in 1/`to`-ths of an input sample using exact
/// integer arithmetic, and the previous chunk's tail sample is kept for
/// interpolation across the boundary. Feeding a stream chunk-by-chunk
/// therefore produces bit-identical output to feeding it whole.
#[derive(Debug)]
pub struct Resampler {
    from: u32,
    to: u32,
    pos: u64,
    prev: Option<f32>,
}

impl Resampler {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            from,
            to,
            pos: 0,
            prev: None,
        }
    }

    pub fn from_rate(&self) -> u32 {
        self.from
    }

    pub fn to_rate(&self) -> u32 {
        self.to
    }

    /// Resamples one chunk, continuing from where the previous chunk ended.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.from == self.to || self.from == 0 || self.to == 0 {
            return input.to_vec();
        }
        if input.is_empty() {
            return Vec::new();
        }

        let mut joined: Vec<f32>;
        let samples: &[f32] = match self.prev {
            Some(p) => {
                joined = Vec::with_capacity(input.len() + 1);
                joined.push(p);
                joined.extend_from_slice(input);
                &joined
            }
            None => input,
        };

        let to = self.to as u64;
        let from = self.from as u64;
        let last = (samples.len() - 1) as u64;

        let mut out =
            Vec::with_capacity(input.len() * self.to as usize / self.from as usize + 2);
        while self.pos <= last * to {
            let idx = (self.pos / to) as usize;
            let rem = self.pos % to;
            let sample = if rem == 0 {
                samples[idx]
            } else {
                let frac = rem as f32 / self.to as f32;
                samples[idx] + (samples[idx + 1] - samples[idx]) * frac
            };
            out.push(sample);
            self.pos += from;
        }

        self.prev = samples.last().copied();
        self.pos -= last * to;
        out
    }

    /// Forgets carried state; the next chunk starts a fresh stream.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.prev = None;
    }
}

/// Subtract the DC offset when it is non-negligible.
///
/// Cheap line-in captures often ride on a constant bias that inflates RMS
/// readings and confuses silence detection.
pub fn remove_dc(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64;
    if mean.abs() < 1e-3 {
        return samples.to_vec();
    }
    let mean = mean as f32;
    samples.iter().map(|&s| s - mean).collect()
}

/// Root-mean-square amplitude. Accumulates in f64 to avoid precision loss
/// on long buffers.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |max, &s| max.max(s.abs()))
}

/// RMS level in dBFS, floored at −60 dB.
pub fn level_db(samples: &[f32]) -> f32 {
    let rms = rms(samples);
    (20.0 * (rms + 1e-10).log10()).clamp(defaults::LEVEL_FLOOR_DB, 0.0)
}

/// True when the buffer contains no sample louder than `threshold`.
///
/// Peak-based: a single transient spike in an otherwise quiet buffer is
/// not silence, even though its RMS is tiny.
pub fn is_silent(samples: &[f32], threshold: f32) -> bool {
    peak(samples) < threshold
}
