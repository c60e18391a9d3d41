//! Wake-word detection heuristic.
//!
//! Not a trained keyword model: the detector scores the newest slice of the
//! rolling window on energy and on an estimated dominant frequency. Speech
//! onsets land in the 800–2000 Hz band; hum, rumble, and broadband noise do
//! not. The score is a heuristic confidence in [0, 1], not a calibrated
//! probability.

use crate::audio::processor::rms;
use crate::defaults;
use serde::{Deserialize, Serialize};

/// How much of the window tail is analyzed per call, in seconds.
///
/// Scoring the whole window would dilute a short trigger phrase with the
/// silence before it.
const ANALYSIS_SECS: f32 = 0.5;

/// RMS at which the energy component saturates at 1.0.
const ENERGY_FULL_SCALE: f32 = 0.05;

/// Minimum window length worth scoring, in seconds.
const MIN_WINDOW_SECS: f32 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct WakeWordConfig {
    pub confidence_threshold: f32,
    /// RMS below this scores zero outright.
    pub energy_floor: f32,
    /// Length of the audio snippet attached to a detection, in seconds.
    pub snippet_secs: f32,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: defaults::WAKE_THRESHOLD,
            energy_floor: defaults::SILENCE_THRESHOLD,
            snippet_secs: defaults::WAKE_SNIPPET_SECS,
        }
    }
}

/// A wake trigger with the audio that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeWordDetection {
    pub confidence: f32,
    pub timestamp_ms: u64,
    pub snippet: Vec<f32>,
}

pub struct WakeWordDetector {
    config: WakeWordConfig,
}

impl WakeWordDetector {
    pub fn new(config: WakeWordConfig) -> Self {
        Self { config }
    }

    /// Scores the window for a wake-like acoustic signature.
    pub fn score(&self, window: &[f32], sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        if (window.len() as f32) < MIN_WINDOW_SECS * sample_rate as f32 {
            return 0.0;
        }

        let analysis_len = (ANALYSIS_SECS * sample_rate as f32) as usize;
        let analysis = &window[window.len().saturating_sub(analysis_len)..];

        let energy = rms(analysis);
        if energy < self.config.energy_floor {
            return 0.0;
        }
        let energy_score = (energy / ENERGY_FULL_SCALE).clamp(0.0, 1.0);

        let band_score = band_score(dominant_frequency(analysis, sample_rate));

        (energy_score * band_score).clamp(0.0, 1.0)
    }

    /// Scores the window and produces a detection when the threshold is met.
    pub fn detect(
        &self,
        window: &[f32],
        sample_rate: u32,
        timestamp_ms: u64,
    ) -> Option<WakeWordDetection> {
        let confidence = self.score(window, sample_rate);
        if confidence < self.config.confidence_threshold {
            return None;
        }

        let snippet_len = (self.config.snippet_secs * sample_rate as f32) as usize;
        let snippet = window[window.len().saturating_sub(snippet_len)..].to_vec();

        Some(WakeWordDetection {
            confidence,
            timestamp_ms,
            snippet,
        })
    }

    pub fn config(&self) -> &WakeWordConfig {
        &self.config
    }
}

/// Zero-crossing estimate of the dominant frequency in Hz.
fn dominant_frequency(samples: &[f32], sample_rate: u32) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f32 * sample_rate as f32 / (2.0 * samples.len() as f32)
}

/// 1.0 inside the voice band, falling off linearly outside it.
fn band_score(freq: f32) -> f32 {
    if freq < defaults::VOICE_BAND_LOW_HZ {
        (freq / defaults::VOICE_BAND_LOW_HZ).clamp(0.0, 1.0)
    } else if freq <= defaults::VOICE_BAND_HIGH_HZ {
        1.0
    } else {
        ((2.0 * defaults::VOICE_BAND_HIGH_HZ - freq) / defaults::VOICE_BAND_HIGH_HZ)
            .clamp(0.0, 1.0)
    }
}
