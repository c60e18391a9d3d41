//! Capture engine trait and the scripted mock used across the test suite.

use crate::audio::AudioFrame;
use crate::capture::{CaptureConfig, EngineState};
use crate::error::{AurisError, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Called for every captured frame. Runs on the capture thread, so it must
/// not block; push to a [`crate::capture::FrameQueue`] and return.
pub type FrameCallback = Box<dyn FnMut(AudioFrame) + Send>;

/// Called when the stream fails after a successful start (device unplugged,
/// backend callback error). Runs off the caller's thread; forward the error
/// to a channel and return.
pub type ErrorCallback = Box<dyn FnMut(AurisError) + Send>;

/// A source of audio frames with a start/stop lifecycle.
pub trait CaptureEngine: Send {
    /// Starts capturing. Transitions Idle → Initializing → Running and fails
    /// with `AlreadyCapturing` when not Idle. Mid-stream failures after a
    /// successful start are delivered through `on_error`.
    fn start(
        &mut self,
        config: CaptureConfig,
        on_frame: FrameCallback,
        on_error: ErrorCallback,
    ) -> Result<()>;

    /// Stops capturing and blocks until the device handle is released, so an
    /// immediate restart cannot race the teardown. Idempotent.
    fn stop(&mut self) -> Result<()>;

    fn state(&self) -> EngineState;
}

/// Scripted capture engine for tests and offline runs.
///
/// Plays back configured sample buffers through the frame callback on a
/// worker thread, split into `buffer_size` chunks with monotonic sequence
/// numbers.
pub struct MockCaptureEngine {
    sample_rate: u32,
    channels: u16,
    script: Vec<Vec<f32>>,
    stream_error: Option<AurisError>,
    should_fail_start: bool,
    realtime_pacing: bool,
    hold_open: bool,
    state: Arc<Mutex<EngineState>>,
    running: Arc<AtomicBool>,
    emitted: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl MockCaptureEngine {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            script: Vec::new(),
            stream_error: None,
            should_fail_start: false,
            realtime_pacing: false,
            hold_open: false,
            state: Arc::new(Mutex::new(EngineState::Idle)),
            running: Arc::new(AtomicBool::new(false)),
            emitted: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    /// Appends a buffer of interleaved samples to the playback script.
    pub fn with_samples(mut self, samples: Vec<f32>) -> Self {
        self.script.push(samples);
        self
    }

    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Emits the error through the error callback after the script finishes,
    /// as if the stream failed mid-capture. The engine lands in `Error`.
    pub fn with_stream_error(mut self, error: AurisError) -> Self {
        self.stream_error = Some(error);
        self
    }

    /// Sleep for each chunk's duration before emitting it, approximating a
    /// real device.
    pub fn with_realtime_pacing(mut self) -> Self {
        self.realtime_pacing = true;
        self
    }

    /// Keep the engine Running after the script is exhausted until `stop`.
    pub fn with_hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Frames emitted so far.
    pub fn emitted_frames(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: EngineState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }
}

impl CaptureEngine for MockCaptureEngine {
    fn start(
        &mut self,
        config: CaptureConfig,
        mut on_frame: FrameCallback,
        mut on_error: ErrorCallback,
    ) -> Result<()> {
        if self.state() != EngineState::Idle {
            return Err(AurisError::AlreadyCapturing);
        }
        self.set_state(EngineState::Initializing);

        if self.should_fail_start {
            self.set_state(EngineState::Error);
            return Err(AurisError::CaptureFailed {
                message: "mock start failure".to_string(),
            });
        }

        let chunk_len = (config.buffer_size as usize).max(1) * self.channels as usize;
        let samples: Vec<f32> = self.script.iter().flatten().copied().collect();
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let realtime = self.realtime_pacing;
        let hold_open = self.hold_open;
        let stream_error = self.stream_error.take();

        let running = Arc::clone(&self.running);
        let emitted = Arc::clone(&self.emitted);
        let state = Arc::clone(&self.state);

        running.store(true, Ordering::SeqCst);
        // Running is set before the worker spawns so a fast script cannot
        // have its terminal state overwritten by this thread.
        self.set_state(EngineState::Running);

        self.worker = Some(std::thread::spawn(move || {
            let chunk_secs = chunk_len as f32 / channels.max(1) as f32 / sample_rate as f32;
            let mut sequence = 0u64;

            for chunk in samples.chunks(chunk_len) {
                // Realtime playback is interruptible; burst playback always
                // finishes the script so tests see every frame.
                if realtime {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    std::thread::sleep(Duration::from_secs_f32(chunk_secs));
                }
                on_frame(AudioFrame::new(
                    chunk.to_vec(),
                    sample_rate,
                    channels,
                    sequence,
                ));
                sequence += 1;
                emitted.fetch_add(1, Ordering::Relaxed);
            }

            if let Some(error) = stream_error {
                if let Ok(mut guard) = state.lock() {
                    *guard = EngineState::Error;
                }
                on_error(error);
            }

            if hold_open {
                while running.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(10));
                }
            }

            if let Ok(mut guard) = state.lock()
                && *guard == EngineState::Running
                && !hold_open
            {
                *guard = EngineState::Idle;
            }
        }));

        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.set_state(EngineState::Stopping);
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| AurisError::CaptureFailed {
                message: "mock capture thread panicked".to_string(),
            })?;
        }
        self.set_state(EngineState::Idle);
        Ok(())
    }

    fn state(&self) -> EngineState {
        self.state
            .lock()
            .map(|guard| *guard)
            .unwrap_or(EngineState::Error)
    }
}
