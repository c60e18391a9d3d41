//! WAV file playback as a capture engine.
//!
//! Replays a recorded file through the frame callback, for offline runs and
//! integration tests that need a deterministic source.

use crate::audio::AudioFrame;
use crate::capture::{CaptureConfig, CaptureEngine, EngineState, ErrorCallback, FrameCallback};
use crate::error::{AurisError, Result};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

pub struct WavCaptureEngine {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    realtime_pacing: bool,
    state: Arc<Mutex<EngineState>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl WavCaptureEngine {
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path).map_err(|e| AurisError::CaptureFailed {
            message: format!("Failed to open WAV file {}: {}", path.display(), e),
        })?;
        Self::from_wav_reader(reader)
    }

    pub fn from_reader(reader: Box<dyn Read>) -> Result<Self> {
        let reader = hound::WavReader::new(reader).map_err(|e| AurisError::CaptureFailed {
            message: format!("Failed to parse WAV stream: {}", e),
        })?;
        Self::from_wav_reader(reader)
    }

    fn from_wav_reader<R: Read>(mut reader: hound::WavReader<R>) -> Result<Self> {
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| AurisError::CaptureFailed {
                    message: format!("Failed to read WAV samples: {}", e),
                })?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| AurisError::CaptureFailed {
                        message: format!("Failed to read WAV samples: {}", e),
                    })?
            }
        };

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            realtime_pacing: false,
            state: Arc::new(Mutex::new(EngineState::Idle)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    /// Pace chunk emission at the file's real duration instead of bursting.
    pub fn with_realtime_pacing(mut self) -> Self {
        self.realtime_pacing = true;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        (self.samples.len() / self.channels as usize) as f32 / self.sample_rate as f32
    }

    fn set_state(&self, state: EngineState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }
}

impl CaptureEngine for WavCaptureEngine {
    // File playback cannot fail mid-stream; the error callback is unused.
    fn start(
        &mut self,
        config: CaptureConfig,
        mut on_frame: FrameCallback,
        _on_error: ErrorCallback,
    ) -> Result<()> {
        if self.state() != EngineState::Idle {
            return Err(AurisError::AlreadyCapturing);
        }
        self.set_state(EngineState::Initializing);

        let chunk_len = (config.buffer_size as usize).max(1) * self.channels as usize;
        let samples = self.samples.clone();
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let realtime = self.realtime_pacing;
        let running = Arc::clone(&self.running);
        let state = Arc::clone(&self.state);

        running.store(true, Ordering::SeqCst);

        self.worker = Some(std::thread::spawn(move || {
            let chunk_secs = config.buffer_size as f32 / sample_rate as f32;
            let mut sequence = 0u64;

            for chunk in samples.chunks(chunk_len) {
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
            }

            if let Ok(mut guard) = state.lock()
                && *guard == EngineState::Running
            {
                *guard = EngineState::Idle;
            }
        }));

        self.set_state(EngineState::Running);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.set_state(EngineState::Stopping);
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| AurisError::CaptureFailed {
                message: "WAV playback thread panicked".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wav_bytes(spec: hound::WavSpec, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &sample in samples {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn mono_16k_spec() -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    #[test]
    fn test_reads_spec_and_duration() {
        let bytes = wav_bytes(mono_16k_spec(), &[0i16; 16000]);
        let engine = WavCaptureEngine::from_reader(Box::new(Cursor::new(bytes))).unwrap();

        assert_eq!(engine.sample_rate(), 16000);
        assert_eq!(engine.channels(), 1);
        assert!((engine.duration_secs() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_int_samples_scale_to_unit_range() {
        let bytes = wav_bytes(mono_16k_spec(), &[i16::MAX, 0, i16::MIN]);
        let engine = WavCaptureEngine::from_reader(Box::new(Cursor::new(bytes))).unwrap();

        assert!((engine.samples[0] - 1.0).abs() < 1e-3);
        assert_eq!(engine.samples[1], 0.0);
        assert!((engine.samples[2] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_replays_file_through_callback() {
        let bytes = wav_bytes(mono_16k_spec(), &[1000i16; 2500]);
        let mut engine = WavCaptureEngine::from_reader(Box::new(Cursor::new(bytes))).unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let config = CaptureConfig {
            buffer_size: 1024,
            ..CaptureConfig::default()
        };
        engine
            .start(
                config,
                Box::new(move |frame| {
                    let _ = tx.send(frame);
                }),
                Box::new(|_error| {}),
            )
            .unwrap();
        engine.stop().unwrap();

        let frames: Vec<AudioFrame> = rx.try_iter().collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].sample_rate, 16000);
        let total: usize = frames.iter().map(|f| f.samples.len()).sum();
        assert_eq!(total, 2500);
    }

    #[test]
    fn test_invalid_wav_data_fails() {
        let result = WavCaptureEngine::from_reader(Box::new(Cursor::new(vec![0u8; 16])));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        let result = WavCaptureEngine::from_path(Path::new("/nonexistent/audio.wav"));
        assert!(matches!(result, Err(AurisError::CaptureFailed { .. })));
    }
}
