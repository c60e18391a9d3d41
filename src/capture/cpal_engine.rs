//! Real audio capture using CPAL (Cross-Platform Audio Library).

use crate::audio::AudioFrame;
use crate::capture::{
    CaptureConfig, CaptureEngine, EngineState, ErrorCallback, FrameCallback, resolve_stream_open,
};
use crate::defaults;
use crate::device::Direction;
use crate::device::cpal_enumerator::{default_capture_device, find_device};
use crate::error::{AurisError, Result};
use crate::sys::with_suppressed_stderr;
use cpal::traits::{DeviceTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: The stream is owned by the engine and only touched from the
/// thread that holds `&mut self`; it never crosses threads mid-call.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Capture engine backed by a CPAL input stream.
///
/// Frames are delivered as f32 in whatever rate/channel layout the stream
/// actually opened with; the consumer normalizes downstream. Tries the
/// requested config first, then falls back to the device's native config —
/// some PipeWire-ALSA setups accept non-native configs but never fire the
/// data callback.
pub struct CpalCaptureEngine {
    state: Arc<Mutex<EngineState>>,
    stream: Option<SendableStream>,
    callback_count: Arc<AtomicU64>,
}

impl CpalCaptureEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::Idle)),
            stream: None,
            callback_count: Arc::new(AtomicU64::new(0)),
        }
    }

    fn set_state(&self, state: EngineState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    /// Opens the stream, retrying when the device reports busy.
    ///
    /// Freshly released devices (browser tabs, other capture apps) often
    /// stay locked for a beat; a few short retries absorb that.
    fn build_with_retry(
        &self,
        device: &cpal::Device,
        device_name: &str,
        config: &CaptureConfig,
        shared: &SharedCallback,
        errors: &SharedErrorCallback,
    ) -> Result<cpal::Stream> {
        let mut last_error = None;
        for attempt in 0..defaults::DEVICE_BUSY_RETRIES {
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(defaults::DEVICE_BUSY_RETRY_DELAY_MS));
            }
            match self.build_stream(device, device_name, config, shared, errors) {
                Ok(stream) => return Ok(stream),
                Err(e) if e.is_retryable() || is_busy_error(&e) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        let _ = last_error;
        Err(AurisError::DeviceLocked {
            device: device_name.to_string(),
        })
    }

    /// Build the audio stream with the configured format.
    ///
    /// Tries in order:
    /// 1. f32 at the requested rate/channels/buffer size
    /// 2. Device default config (native rate/channels, f32 or i16)
    fn build_stream(
        &self,
        device: &cpal::Device,
        device_name: &str,
        config: &CaptureConfig,
        shared: &SharedCallback,
        errors: &SharedErrorCallback,
    ) -> Result<cpal::Stream> {
        let requested = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };

        let err_callback = stream_error_callback(
            Arc::clone(&self.state),
            device_name.to_string(),
            Arc::clone(errors),
        );

        let emitter = FrameEmitter {
            callback: Arc::clone(shared),
            counter: Arc::clone(&self.callback_count),
            sample_rate: config.sample_rate,
            channels: config.channels,
            sequence: 0,
        };
        if let Ok(stream) = device.build_input_stream(
            &requested,
            {
                let mut emitter = emitter;
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    emitter.emit(data.to_vec());
                }
            },
            err_callback.clone(),
            None,
        ) {
            return Ok(stream);
        }

        self.build_stream_native(device, shared, err_callback)
    }

    /// Build a stream using the device's default/native config. The frames
    /// carry their true rate/channels; normalization happens downstream.
    fn build_stream_native(
        &self,
        device: &cpal::Device,
        shared: &SharedCallback,
        err_callback: impl FnMut(cpal::StreamError) + Send + Clone + 'static,
    ) -> Result<cpal::Stream> {
        let default_config =
            device
                .default_input_config()
                .map_err(|e| AurisError::CaptureFailed {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels();
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        eprintln!(
            "auris: using native audio format ({}ch/{}Hz/{:?})",
            native_channels,
            native_rate,
            default_config.sample_format(),
        );

        let mut emitter = FrameEmitter {
            callback: Arc::clone(shared),
            counter: Arc::clone(&self.callback_count),
            sample_rate: native_rate,
            channels: native_channels,
            sequence: 0,
        };

        match default_config.sample_format() {
            cpal::SampleFormat::F32 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        emitter.emit(data.to_vec());
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| AurisError::CaptureFailed {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            cpal::SampleFormat::I16 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let converted: Vec<f32> =
                            data.iter().map(|&s| s as f32 / 32768.0).collect();
                        emitter.emit(converted);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| AurisError::CaptureFailed {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            fmt => Err(AurisError::FormatUnsupported {
                detail: format!("native sample format {:?}", fmt),
            }),
        }
    }
}

impl Default for CpalCaptureEngine {
    fn default() -> Self {
        Self::new()
    }
}

type SharedCallback = Arc<Mutex<FrameCallback>>;
type SharedErrorCallback = Arc<Mutex<ErrorCallback>>;

/// Assembles capture buffers into sequence-numbered frames.
struct FrameEmitter {
    callback: SharedCallback,
    counter: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u16,
    sequence: u64,
}

impl FrameEmitter {
    fn emit(&mut self, samples: Vec<f32>) {
        self.counter.fetch_add(1, Ordering::Relaxed);
        let frame = AudioFrame::new(samples, self.sample_rate, self.channels, self.sequence);
        self.sequence += 1;
        if let Ok(mut callback) = self.callback.lock() {
            callback(frame);
        }
    }
}

/// Heuristic classification of backend errors that mean "try again shortly".
fn is_busy_error(error: &AurisError) -> bool {
    let text = error.to_string().to_lowercase();
    text.contains("busy") || text.contains("in use") || text.contains("exclusive")
}

/// Maps a runtime stream error onto the crate's error types.
fn map_stream_error(error: cpal::StreamError, device_name: &str) -> AurisError {
    match error {
        cpal::StreamError::DeviceNotAvailable => AurisError::DeviceDisconnected {
            device: device_name.to_string(),
        },
        other => AurisError::CaptureCallback {
            message: other.to_string(),
        },
    }
}

/// Error callback shared by all stream builds: log, mark the engine Errored,
/// and hand the mapped error to the listener's error lane.
fn stream_error_callback(
    state: Arc<Mutex<EngineState>>,
    device_name: String,
    on_error: SharedErrorCallback,
) -> impl FnMut(cpal::StreamError) + Send + Clone + 'static {
    move |err| {
        let mapped = map_stream_error(err, &device_name);
        eprintln!("auris: {}", mapped);
        if let Ok(mut guard) = state.lock() {
            *guard = EngineState::Error;
        }
        if let Ok(mut callback) = on_error.lock() {
            callback(mapped);
        }
    }
}

impl CaptureEngine for CpalCaptureEngine {
    fn start(
        &mut self,
        config: CaptureConfig,
        on_frame: FrameCallback,
        on_error: ErrorCallback,
    ) -> Result<()> {
        if self.state() != EngineState::Idle {
            return Err(AurisError::AlreadyCapturing);
        }
        self.set_state(EngineState::Initializing);

        let result = self.start_inner(&config, on_frame, on_error);
        match &result {
            Ok(()) => self.set_state(EngineState::Running),
            // Start failures release everything they acquired; the engine is
            // safe to retry with a corrected config.
            Err(_) => self.set_state(EngineState::Idle),
        }
        result
    }

    fn stop(&mut self) -> Result<()> {
        self.set_state(EngineState::Stopping);
        if let Some(stream) = self.stream.take() {
            stream.0.pause().map_err(|e| AurisError::CaptureFailed {
                message: format!("Failed to stop audio stream: {}", e),
            })?;
            // Dropping the stream releases the device handle synchronously;
            // a restart after stop() returns cannot hit DeviceLocked.
            drop(stream);
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

impl CpalCaptureEngine {
    fn start_inner(
        &mut self,
        config: &CaptureConfig,
        on_frame: FrameCallback,
        on_error: ErrorCallback,
    ) -> Result<()> {
        let (device, direction, device_name) = match &config.device_id {
            Some(id) => {
                let (device, direction) = find_device(id)?;
                (device, direction, id.clone())
            }
            None => (default_capture_device()?, Direction::Capture, "default".to_string()),
        };

        let open = resolve_stream_open(config.method, direction)?;
        // CPAL expresses WASAPI loopback by building an input stream on a
        // render device, which is exactly what the resolved parameters say:
        // capture direction, loopback flag set. There is no render-direction
        // stream to build here, ever.
        debug_assert_eq!(open.direction, Direction::Capture);

        let shared: SharedCallback = Arc::new(Mutex::new(on_frame));
        let errors: SharedErrorCallback = Arc::new(Mutex::new(on_error));
        self.callback_count.store(0, Ordering::Relaxed);

        let stream = with_suppressed_stderr(|| {
            self.build_with_retry(&device, &device_name, config, &shared, &errors)
        })?;
        stream.play().map_err(|e| AurisError::CaptureFailed {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        // Wait briefly to check the callback actually fires. Some
        // PipeWire-ALSA setups accept non-native configs but never deliver.
        std::thread::sleep(Duration::from_millis(200));

        let final_stream = if self.callback_count.load(Ordering::Relaxed) == 0 {
            drop(stream);
            let err_callback = stream_error_callback(
                Arc::clone(&self.state),
                device_name.clone(),
                Arc::clone(&errors),
            );
            let native = with_suppressed_stderr(|| {
                self.build_stream_native(&device, &shared, err_callback)
            })?;
            native.play().map_err(|e| AurisError::CaptureFailed {
                message: format!("Failed to start native audio stream: {}", e),
            })?;
            native
        } else {
            stream
        };

        self.stream = Some(SendableStream(final_stream));
        Ok(())
    }
}
