//! Whisper-based transcription engine.
//!
//! This module provides a Whisper implementation of the TranscriptionEngine
//! trait using whisper-rs.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be
//! installed. To build with Whisper support:
//!
//! ```bash
//! cargo build --features whisper
//! ```

use crate::defaults;
use crate::dispatch::{TranscriptionEngine, TranscriptionResult};
use crate::error::{AurisError, Result};
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for the Whisper engine.
#[derive(Debug, Clone)]
pub struct WhisperEngineConfig {
    /// Path to the Whisper model file
    pub model_path: PathBuf,
    /// Language code (e.g., "en", "es", "fr"), or "auto"
    pub language: String,
    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
}

impl Default for WhisperEngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

/// Whisper-based transcription engine.
///
/// The WhisperContext is wrapped in a Mutex: one inference at a time, which
/// matches the dispatcher's one-recording-at-a-time cadence anyway.
#[cfg(feature = "whisper")]
pub struct WhisperEngine {
    context: Mutex<WhisperContext>,
    config: WhisperEngineConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper engine placeholder (without the whisper feature).
///
/// Construction still validates the model path; transcription returns an
/// error pointing at the missing feature.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperEngine {
    config: WhisperEngineConfig,
    model_name: String,
}

fn model_name_from_path(path: &std::path::Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(feature = "whisper")]
impl WhisperEngine {
    /// Loads the model and prepares the engine.
    ///
    /// # Errors
    /// Returns `AurisError::TranscriptionModelNotFound` if the model file
    /// doesn't exist, `AurisError::TranscriptionEngine` if loading fails.
    pub fn new(config: WhisperEngineConfig) -> Result<Self> {
        // Install logging hooks to suppress whisper.cpp output (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(AurisError::TranscriptionModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_from_path(&config.model_path);

        let mut context_params = WhisperContextParameters::default();
        // Fused attention kernels; avoids the standalone softmax CUDA kernel
        // that crashes on Blackwell GPUs with ggml <= 1.7.6
        context_params.flash_attn(true);
        let context = WhisperContext::new_with_params(
            config
                .model_path
                .to_str()
                .ok_or_else(|| AurisError::TranscriptionEngine {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            context_params,
        )
        .map_err(|e| AurisError::TranscriptionEngine {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }

    pub fn config(&self) -> &WhisperEngineConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperEngine {
    /// Create a Whisper engine (stub implementation).
    pub fn new(config: WhisperEngineConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(AurisError::TranscriptionModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_from_path(&config.model_path);
        Ok(Self { config, model_name })
    }

    pub fn config(&self) -> &WhisperEngineConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl TranscriptionEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32], sample_rate: u32) -> Result<TranscriptionResult> {
        // Whisper models are trained on 16kHz; the pipeline normalizes
        // before dispatch, so anything else is a wiring bug upstream.
        if sample_rate != defaults::SAMPLE_RATE {
            return Err(AurisError::TranscriptionEngine {
                message: format!(
                    "Whisper requires {}Hz audio, got {}Hz",
                    defaults::SAMPLE_RATE,
                    sample_rate
                ),
            });
        }

        let context = self
            .context
            .lock()
            .map_err(|e| AurisError::TranscriptionEngine {
                message: format!("Failed to acquire context lock: {}", e),
            })?;

        let mut state = context
            .create_state()
            .map_err(|e| AurisError::TranscriptionEngine {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if self.config.language == defaults::AUTO_LANGUAGE {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }

        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }

        // Disable printing to stdout/stderr
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, audio)
            .map_err(|e| AurisError::TranscriptionEngine {
                message: format!("Whisper inference failed: {}", e),
            })?;

        // Confidence = mean of (1 - no_speech_probability) over segments
        let mut text = String::new();
        let mut confidence_sum = 0.0_f32;
        let mut segment_count = 0u32;
        for segment in state.as_iter() {
            text.push_str(&segment.to_string());
            confidence_sum += 1.0 - segment.no_speech_probability();
            segment_count += 1;
        }

        let confidence = if segment_count > 0 {
            (confidence_sum / segment_count as f32).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Ok(TranscriptionResult {
            text: text.trim().to_string(),
            confidence,
            duration_secs: audio.len() as f32 / sample_rate as f32,
            timestamp_ms: 0,
        })
    }

    fn name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl TranscriptionEngine for WhisperEngine {
    fn transcribe(&self, _audio: &[f32], _sample_rate: u32) -> Result<TranscriptionResult> {
        Err(AurisError::TranscriptionEngine {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --features whisper\n",
                "If the build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WhisperEngineConfig::default();
        assert_eq!(config.model_path, PathBuf::from("models/ggml-base.bin"));
        assert_eq!(config.language, defaults::AUTO_LANGUAGE);
        assert_eq!(config.threads, None);
    }

    #[test]
    fn test_new_fails_for_missing_model() {
        let config = WhisperEngineConfig {
            model_path: PathBuf::from("/nonexistent/model.bin"),
            language: "en".to_string(),
            threads: None,
        };

        match WhisperEngine::new(config) {
            Err(AurisError::TranscriptionModelNotFound { path }) => {
                assert_eq!(path, "/nonexistent/model.bin");
            }
            other => panic!("Expected TranscriptionModelNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_model_name_extraction() {
        assert_eq!(
            model_name_from_path(std::path::Path::new("/models/ggml-base.bin")),
            "ggml-base"
        );
        assert_eq!(model_name_from_path(std::path::Path::new("")), "unknown");
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_stub_reports_not_ready() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let config = WhisperEngineConfig {
            model_path: temp.path().to_path_buf(),
            language: "en".to_string(),
            threads: None,
        };
        let engine = WhisperEngine::new(config).unwrap();
        assert!(!engine.is_ready());
        assert!(engine.transcribe(&[0.0; 100], 16000).is_err());
    }
}
