//! The listening/recording state machine.
//!
//! Consumes normalized mono audio chunk by chunk and emits events when a
//! wake trigger fires or a recording finishes. All timing is audio time —
//! accumulated sample durations — never wall clock, so behavior under test
//! is fully deterministic.

use crate::audio::frame::{CircularAudioBuffer, RecordingSession};
use crate::audio::processor::is_silent;
use crate::defaults;
use crate::wake::{WakeWordConfig, WakeWordDetection, WakeWordDetector};

/// Pipeline states.
///
/// `WakeWordDetected` and `SilenceTimeout` are transient: the machine
/// passes through them and settles in `Recording` or `Listening` within the
/// same `process_chunk` call. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    Idle,
    Listening,
    WakeWordDetected,
    Recording,
    SilenceTimeout,
    Stopped,
}

/// A recording ready for transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedRecording {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub started_at_ms: u64,
}

impl FinalizedRecording {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Events emitted by [`SpeechStateMachine::process_chunk`] and
/// [`SpeechStateMachine::stop`].
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    WakeWord(WakeWordDetection),
    Finalized(FinalizedRecording),
    Discarded { duration_secs: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechConfig {
    /// Rate of the normalized audio fed to `process_chunk`.
    pub sample_rate: u32,
    pub silence_threshold: f32,
    pub silence_duration: f32,
    pub max_recording_duration: f32,
    pub min_audio_length: f32,
    pub wake_window_secs: f32,
    pub wake: WakeWordConfig,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            silence_threshold: defaults::SILENCE_THRESHOLD,
            silence_duration: defaults::SILENCE_DURATION_SECS,
            max_recording_duration: defaults::MAX_RECORDING_SECS,
            min_audio_length: defaults::MIN_AUDIO_SECS,
            wake_window_secs: defaults::WAKE_WINDOW_SECS,
            wake: WakeWordConfig::default(),
        }
    }
}

pub struct SpeechStateMachine {
    config: SpeechConfig,
    state: ListenState,
    ring: CircularAudioBuffer,
    detector: WakeWordDetector,
    session: Option<RecordingSession>,
    silence_run_secs: f32,
    wake_count: u64,
}

impl SpeechStateMachine {
    pub fn new(config: SpeechConfig) -> Self {
        let ring = CircularAudioBuffer::with_duration(config.wake_window_secs, config.sample_rate);
        let detector = WakeWordDetector::new(config.wake.clone());
        Self {
            config,
            state: ListenState::Idle,
            ring,
            detector,
            session: None,
            silence_run_secs: 0.0,
            wake_count: 0,
        }
    }

    pub fn state(&self) -> ListenState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == ListenState::Recording
    }

    /// Wake triggers fired since creation.
    pub fn wake_count(&self) -> u64 {
        self.wake_count
    }

    /// Arms the machine. Only transitions from `Idle`.
    pub fn start_listening(&mut self) {
        if self.state == ListenState::Idle {
            self.state = ListenState::Listening;
        }
    }

    /// Feeds one chunk of normalized mono audio.
    ///
    /// `now_ms` stamps emitted events; it plays no part in segmentation
    /// decisions, which run on audio time alone.
    pub fn process_chunk(&mut self, samples: &[f32], now_ms: u64) -> Vec<SpeechEvent> {
        match self.state {
            ListenState::Idle | ListenState::Stopped => Vec::new(),
            ListenState::Listening => self.process_listening(samples, now_ms),
            ListenState::Recording => self.process_recording(samples),
            // Transient states never survive across calls
            ListenState::WakeWordDetected | ListenState::SilenceTimeout => Vec::new(),
        }
    }

    fn process_listening(&mut self, samples: &[f32], now_ms: u64) -> Vec<SpeechEvent> {
        self.ring.push_samples(samples);

        let window = self.ring.snapshot();
        let Some(detection) = self
            .detector
            .detect(&window, self.config.sample_rate, now_ms)
        else {
            return Vec::new();
        };

        self.state = ListenState::WakeWordDetected;
        self.wake_count += 1;

        // Seed the session with the trigger snippet so the dispatched
        // buffer contains the phrase that woke us.
        let mut session = RecordingSession::new(self.config.sample_rate, now_ms);
        session.append(&detection.snippet);
        self.session = Some(session);
        self.silence_run_secs = 0.0;

        // Leftover window audio must not re-trigger after the recording ends
        self.ring.clear();

        self.state = ListenState::Recording;
        vec![SpeechEvent::WakeWord(detection)]
    }

    fn process_recording(&mut self, samples: &[f32]) -> Vec<SpeechEvent> {
        let chunk_secs = samples.len() as f32 / self.config.sample_rate as f32;

        if let Some(session) = self.session.as_mut() {
            session.append(samples);
        }

        if is_silent(samples, self.config.silence_threshold) {
            self.silence_run_secs += chunk_secs;
        } else {
            self.silence_run_secs = 0.0;
        }

        let duration = self
            .session
            .as_ref()
            .map(|s| s.duration_secs())
            .unwrap_or(0.0);

        if duration >= self.config.max_recording_duration {
            // Hard ceiling: finalize at exactly the bound
            let event = self.finalize(Some(self.config.max_recording_duration));
            self.state = ListenState::Listening;
            return event.into_iter().collect();
        }

        if self.silence_run_secs >= self.config.silence_duration {
            self.state = ListenState::SilenceTimeout;
            let event = self.finalize(None);
            self.state = ListenState::Listening;
            return event.into_iter().collect();
        }

        Vec::new()
    }

    /// Ends the pipeline. An in-flight recording is finalized when it meets
    /// `min_audio_length`, discarded otherwise. The machine is `Stopped`
    /// afterwards either way.
    pub fn stop(&mut self) -> Option<SpeechEvent> {
        let event = if self.state == ListenState::Recording {
            let duration = self
                .session
                .as_ref()
                .map(|s| s.duration_secs())
                .unwrap_or(0.0);
            if duration >= self.config.min_audio_length {
                self.finalize(None)
            } else {
                self.session = None;
                Some(SpeechEvent::Discarded {
                    duration_secs: duration,
                })
            }
        } else {
            None
        };

        self.state = ListenState::Stopped;
        event
    }

    fn finalize(&mut self, truncate_to_secs: Option<f32>) -> Option<SpeechEvent> {
        let session = self.session.take()?;
        let sample_rate = session.sample_rate();
        let started_at_ms = session.started_at_ms();
        let mut samples = session.into_samples();

        if let Some(limit) = truncate_to_secs {
            let max_samples = (limit * sample_rate as f32) as usize;
            samples.truncate(max_samples);
        }

        self.silence_run_secs = 0.0;
        self.ring.clear();

        Some(SpeechEvent::Finalized(FinalizedRecording {
            samples,
            sample_rate,
            started_at_ms,
        }))
    }
}
