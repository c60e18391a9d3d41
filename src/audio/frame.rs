//! Sample containers flowing through the capture pipeline.

use std::collections::VecDeque;

/// A chunk of interleaved samples delivered by a capture callback.
///
/// Sequence numbers increase monotonically per stream so downstream
/// consumers can detect drops.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub sequence: u64,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16, sequence: u64) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
            sequence,
        }
    }

    /// Number of sample frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f32 / self.sample_rate as f32
    }
}

/// Fixed-capacity ring over mono f32 samples.
///
/// Writes past capacity overwrite the oldest samples. Used for the wake
/// analysis window, where only the most recent audio matters.
#[derive(Debug)]
pub struct CircularAudioBuffer {
    buf: VecDeque<f32>,
    capacity: usize,
}

impl CircularAudioBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Ring sized to hold `secs` seconds at `sample_rate`.
    pub fn with_duration(secs: f32, sample_rate: u32) -> Self {
        let capacity = (secs * sample_rate as f32).max(1.0) as usize;
        Self::new(capacity)
    }

    pub fn push_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            if self.buf.len() == self.capacity {
                self.buf.pop_front();
            }
            self.buf.push_back(sample);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Contents ordered oldest to newest.
    pub fn snapshot(&self) -> Vec<f32> {
        self.buf.iter().copied().collect()
    }

    /// Up to the newest `count` samples, ordered oldest to newest.
    pub fn tail(&self, count: usize) -> Vec<f32> {
        let skip = self.buf.len().saturating_sub(count);
        self.buf.iter().skip(skip).copied().collect()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Accumulates samples for one wake-triggered recording.
#[derive(Debug)]
pub struct RecordingSession {
    started_at_ms: u64,
    sample_rate: u32,
    samples: Vec<f32>,
}

impl RecordingSession {
    pub fn new(sample_rate: u32, started_at_ms: u64) -> Self {
        Self {
            started_at_ms,
            sample_rate,
            samples: Vec::new(),
        }
    }

    pub fn append(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}
