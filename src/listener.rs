//! End-to-end pipeline wiring: capture engine → frame queue → segmentation →
//! transcription dispatch.
//!
//! The capture callback only pushes frames into a bounded queue. A consumer
//! thread normalizes each frame (downmix, resample) and feeds the speech
//! state machine; finalized recordings cross a channel to a dispatch thread
//! that runs the transcription engine under a deadline. Engine failures and
//! timeouts cost one recording, never the pipeline.

use crate::audio::processor::{Resampler, downmix_to_mono};
use crate::capture::{CaptureConfig, CaptureEngine, EngineState, FrameQueue};
use crate::config::Config;
use crate::defaults;
use crate::dispatch::{Dispatcher, TranscriptionEngine, TranscriptionResult};
use crate::error::{AurisError, Result};
use crate::speech::{FinalizedRecording, SpeechConfig, SpeechEvent, SpeechStateMachine};
use crate::wake::{WakeWordConfig, WakeWordDetection};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Builds and starts the always-on pipeline.
pub struct Listener;

impl Listener {
    /// Starts capturing and returns a handle for polling events.
    pub fn start(
        config: &Config,
        capture: Box<dyn CaptureEngine>,
        engine: Arc<dyn TranscriptionEngine>,
    ) -> Result<ListenerHandle> {
        Self::start_with_queue_capacity(config, capture, engine, defaults::FRAME_QUEUE_CAPACITY)
    }

    /// Same as [`Listener::start`] with an explicit frame queue capacity.
    pub fn start_with_queue_capacity(
        config: &Config,
        mut capture: Box<dyn CaptureEngine>,
        engine: Arc<dyn TranscriptionEngine>,
        queue_capacity: usize,
    ) -> Result<ListenerHandle> {
        let queue = Arc::new(FrameQueue::new(queue_capacity));
        let running = Arc::new(AtomicBool::new(true));

        let (wake_tx, wake_rx) = crossbeam_channel::unbounded();
        let (transcription_tx, transcription_rx) = crossbeam_channel::unbounded();
        let (error_tx, error_rx) = crossbeam_channel::unbounded();
        let (recording_tx, recording_rx) = crossbeam_channel::unbounded::<FinalizedRecording>();

        let speech_config = SpeechConfig {
            sample_rate: config.audio.sample_rate,
            silence_threshold: config.audio.silence_threshold,
            silence_duration: config.audio.silence_duration,
            max_recording_duration: config.audio.max_recording_duration,
            min_audio_length: config.audio.min_audio_length,
            wake_window_secs: config.wake.window_secs,
            wake: WakeWordConfig {
                confidence_threshold: config.wake.confidence_threshold,
                energy_floor: config.audio.silence_threshold,
                ..WakeWordConfig::default()
            },
        };

        let dispatcher = Dispatcher::new(
            engine,
            Duration::from_secs(config.dispatch.timeout_secs),
        );

        let consumer = {
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            let target_rate = config.audio.sample_rate;
            let overrun_tx = error_tx.clone();
            std::thread::spawn(move || {
                consumer_loop(
                    &queue,
                    &running,
                    speech_config,
                    target_rate,
                    &wake_tx,
                    &recording_tx,
                    &overrun_tx,
                );
            })
        };

        // Stream failures after start (device unplugged, backend errors) land
        // on the same error lane as overruns and dispatch failures.
        let capture_error_tx = error_tx.clone();

        let dispatch_worker = std::thread::spawn(move || {
            for recording in recording_rx.iter() {
                match dispatcher.submit_blocking(
                    recording.samples,
                    recording.sample_rate,
                    recording.started_at_ms,
                ) {
                    Ok(result) => {
                        let _ = transcription_tx.send(result);
                    }
                    Err(e) => {
                        eprintln!("auris: transcription failed: {}", e);
                        let _ = error_tx.send(e);
                    }
                }
            }
        });

        let capture_config = CaptureConfig {
            device_id: config.audio.device.clone(),
            sample_rate: config.audio.sample_rate,
            channels: 1,
            buffer_size: config.audio.chunk_size,
            ..CaptureConfig::default()
        };

        let callback_queue = Arc::clone(&queue);
        if let Err(e) = capture.start(
            capture_config,
            Box::new(move |frame| callback_queue.push(frame)),
            Box::new(move |error| {
                let _ = capture_error_tx.send(error);
            }),
        ) {
            // Unwind the threads we already spawned
            running.store(false, Ordering::SeqCst);
            let _ = consumer.join();
            let _ = dispatch_worker.join();
            return Err(e);
        }

        Ok(ListenerHandle {
            capture,
            queue,
            running,
            consumer: Some(consumer),
            dispatch_worker: Some(dispatch_worker),
            wake_rx,
            transcription_rx,
            error_rx,
        })
    }
}

fn consumer_loop(
    queue: &FrameQueue,
    running: &AtomicBool,
    speech_config: SpeechConfig,
    target_rate: u32,
    wake_tx: &Sender<WakeWordDetection>,
    recording_tx: &Sender<FinalizedRecording>,
    error_tx: &Sender<AurisError>,
) {
    let mut machine = SpeechStateMachine::new(speech_config);
    machine.start_listening();
    let mut resampler: Option<Resampler> = None;
    let mut reported_drops = 0u64;

    while running.load(Ordering::SeqCst) {
        let Some(frame) = queue.pop_timeout(Duration::from_millis(100)) else {
            continue;
        };
        process_frame(
            frame,
            target_rate,
            &mut resampler,
            &mut machine,
            wake_tx,
            recording_tx,
        );

        // Overruns surface as events; capture keeps going regardless
        let drops = queue.dropped();
        if drops > reported_drops {
            let _ = error_tx.send(AurisError::BufferOverrun {
                dropped: drops - reported_drops,
            });
            reported_drops = drops;
        }
    }

    // Drain whatever the capture engine emitted before it stopped
    while let Some(frame) = queue.try_pop() {
        process_frame(
            frame,
            target_rate,
            &mut resampler,
            &mut machine,
            wake_tx,
            recording_tx,
        );
    }

    // An in-flight recording is finalized or discarded by length
    if let Some(SpeechEvent::Finalized(recording)) = machine.stop() {
        let _ = recording_tx.send(recording);
    }
}

fn process_frame(
    frame: crate::audio::AudioFrame,
    target_rate: u32,
    resampler: &mut Option<Resampler>,
    machine: &mut SpeechStateMachine,
    wake_tx: &Sender<WakeWordDetection>,
    recording_tx: &Sender<FinalizedRecording>,
) {
    let mono = downmix_to_mono(&frame.samples, frame.channels);

    let chunk = if frame.sample_rate == target_rate {
        mono
    } else {
        let needs_new = resampler
            .as_ref()
            .map(|r| r.from_rate() != frame.sample_rate)
            .unwrap_or(true);
        if needs_new {
            *resampler = Some(Resampler::new(frame.sample_rate, target_rate));
        }
        match resampler.as_mut() {
            Some(r) => r.process(&mono),
            None => mono,
        }
    };

    for event in machine.process_chunk(&chunk, now_ms()) {
        match event {
            SpeechEvent::WakeWord(detection) => {
                let _ = wake_tx.send(detection);
            }
            SpeechEvent::Finalized(recording) => {
                let _ = recording_tx.send(recording);
            }
            SpeechEvent::Discarded { duration_secs } => {
                eprintln!(
                    "auris: discarded {:.1}s recording below minimum length",
                    duration_secs
                );
            }
        }
    }
}

/// Running pipeline handle. Events are polled; nothing here blocks.
pub struct ListenerHandle {
    capture: Box<dyn CaptureEngine>,
    queue: Arc<FrameQueue>,
    running: Arc<AtomicBool>,
    consumer: Option<JoinHandle<()>>,
    dispatch_worker: Option<JoinHandle<()>>,
    wake_rx: Receiver<WakeWordDetection>,
    transcription_rx: Receiver<TranscriptionResult>,
    error_rx: Receiver<AurisError>,
}

impl ListenerHandle {
    /// Next wake trigger, if one fired since the last poll.
    pub fn check_for_wake_word(&self) -> Option<WakeWordDetection> {
        self.wake_rx.try_recv().ok()
    }

    /// Next finished transcription, if one arrived since the last poll.
    pub fn check_for_transcription(&self) -> Option<TranscriptionResult> {
        self.transcription_rx.try_recv().ok()
    }

    /// Next cycle-scoped failure (engine error, timeout), if any.
    pub fn check_for_error(&self) -> Option<AurisError> {
        self.error_rx.try_recv().ok()
    }

    /// Receiver for wake triggers, for callers that prefer blocking reads.
    /// Draws from the same channel as [`Self::check_for_wake_word`]; each
    /// event is delivered exactly once across both.
    pub fn wake_events(&self) -> &Receiver<WakeWordDetection> {
        &self.wake_rx
    }

    /// Receiver for finished transcriptions.
    pub fn transcription_events(&self) -> &Receiver<TranscriptionResult> {
        &self.transcription_rx
    }

    /// Receiver for cycle-scoped failures.
    pub fn error_events(&self) -> &Receiver<AurisError> {
        &self.error_rx
    }

    /// Frames evicted because the consumer fell behind.
    pub fn dropped_frames(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn capture_state(&self) -> EngineState {
        self.capture.state()
    }

    /// Stops the pipeline in order: capture first, then the consumer drains
    /// and flushes the state machine, then the dispatch worker finishes any
    /// queued recording. Pending results stay pollable after this returns.
    pub fn stop(&mut self) -> Result<()> {
        self.capture.stop()?;
        self.running.store(false, Ordering::SeqCst);

        if let Some(consumer) = self.consumer.take() {
            consumer.join().map_err(|_| {
                AurisError::Other("pipeline consumer thread panicked".to_string())
            })?;
        }
        // Consumer exit drops the recording sender; the dispatch worker
        // finishes the backlog and returns.
        if let Some(worker) = self.dispatch_worker.take() {
            worker.join().map_err(|_| {
                AurisError::Other("transcription dispatch thread panicked".to_string())
            })?;
        }

        let dropped = self.queue.dropped();
        if dropped > 0 {
            eprintln!("auris: dropped {} frames during capture", dropped);
        }
        Ok(())
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.consumer.is_some() {
            let _ = self.stop();
        }
    }
}
