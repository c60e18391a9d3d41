use crate::defaults;
use crate::error::{AurisError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub wake: WakeConfig,
    pub dispatch: DispatchConfig,
}

/// Audio capture and segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub chunk_size: u32,
    pub silence_threshold: f32,
    pub silence_duration: f32,
    pub max_recording_duration: f32,
    pub min_audio_length: f32,
}

/// Wake-word detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WakeConfig {
    pub confidence_threshold: f32,
    pub window_secs: f32,
}

/// Transcription dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    pub timeout_secs: u64,
    pub model: String,
    pub language: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            chunk_size: defaults::CHUNK_SIZE,
            silence_threshold: defaults::SILENCE_THRESHOLD,
            silence_duration: defaults::SILENCE_DURATION_SECS,
            max_recording_duration: defaults::MAX_RECORDING_SECS,
            min_audio_length: defaults::MIN_AUDIO_SECS,
        }
    }
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: defaults::WAKE_THRESHOLD,
            window_secs: defaults::WAKE_WINDOW_SECS,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::DISPATCH_TIMEOUT_SECS,
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AurisError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                AurisError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Only returns defaults if the file is missing; invalid TOML or
    /// invalid values are still errors.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(AurisError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - AURIS_AUDIO_DEVICE → audio.device
    /// - AURIS_MODEL → dispatch.model
    /// - AURIS_LANGUAGE → dispatch.language
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("AURIS_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(model) = std::env::var("AURIS_MODEL")
            && !model.is_empty()
        {
            self.dispatch.model = model;
        }

        if let Ok(language) = std::env::var("AURIS_LANGUAGE")
            && !language.is_empty()
        {
            self.dispatch.language = language;
        }

        self
    }

    /// Reject values a running pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(AurisError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.chunk_size == 0 {
            return Err(AurisError::ConfigInvalidValue {
                key: "audio.chunk_size".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.audio.silence_threshold) {
            return Err(AurisError::ConfigInvalidValue {
                key: "audio.silence_threshold".to_string(),
                message: "must be in 0.0..=1.0".to_string(),
            });
        }
        if self.audio.silence_duration <= 0.0 {
            return Err(AurisError::ConfigInvalidValue {
                key: "audio.silence_duration".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.min_audio_length > self.audio.max_recording_duration {
            return Err(AurisError::ConfigInvalidValue {
                key: "audio.min_audio_length".to_string(),
                message: "must not exceed max_recording_duration".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.wake.confidence_threshold) {
            return Err(AurisError::ConfigInvalidValue {
                key: "wake.confidence_threshold".to_string(),
                message: "must be in 0.0..=1.0".to_string(),
            });
        }
        if self.wake.window_secs <= 0.0 {
            return Err(AurisError::ConfigInvalidValue {
                key: "wake.window_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.dispatch.timeout_secs == 0 {
            return Err(AurisError::ConfigInvalidValue {
                key: "dispatch.timeout_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/auris/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("auris").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_auris_env() {
        remove_env("AURIS_AUDIO_DEVICE");
        remove_env("AURIS_MODEL");
        remove_env("AURIS_LANGUAGE");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.audio.device, None);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.chunk_size, 1024);
        assert_eq!(config.audio.silence_threshold, 0.01);
        assert_eq!(config.audio.silence_duration, 2.0);
        assert_eq!(config.audio.max_recording_duration, 30.0);
        assert_eq!(config.audio.min_audio_length, 1.5);

        assert_eq!(config.wake.confidence_threshold, 0.6);
        assert_eq!(config.wake.window_secs, 2.0);

        assert_eq!(config.dispatch.timeout_secs, 10);
        assert_eq!(config.dispatch.model, "base");
        assert_eq!(config.dispatch.language, "auto");
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [audio]
            device = "Speakers (Loopback)"
            sample_rate = 48000
            silence_threshold = 0.02
            silence_duration = 2.5

            [wake]
            confidence_threshold = 0.7

            [dispatch]
            timeout_secs = 15
            model = "large-v3"
            language = "es"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.audio.device, Some("Speakers (Loopback)".to_string()));
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.audio.silence_threshold, 0.02);
        assert_eq!(config.audio.silence_duration, 2.5);
        // Fields absent from the file keep defaults
        assert_eq!(config.audio.max_recording_duration, 30.0);

        assert_eq!(config.wake.confidence_threshold, 0.7);
        assert_eq!(config.wake.window_secs, 2.0);

        assert_eq!(config.dispatch.timeout_secs, 15);
        assert_eq!(config.dispatch.model, "large-v3");
        assert_eq!(config.dispatch.language, "es");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let toml_content = r#"
            [dispatch]
            model = "small"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.dispatch.model, "small");
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.wake.confidence_threshold, 0.6);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let result = Config::load(Path::new("/nonexistent/auris.toml"));
        assert!(matches!(result, Err(AurisError::ConfigFileNotFound { .. })));
    }

    #[test]
    fn test_load_or_default_missing_file_returns_defaults() {
        let config = Config::load_or_default(Path::new("/nonexistent/auris.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_invalid_toml_is_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"not = valid = toml").unwrap();

        let result = Config::load_or_default(temp_file.path());
        assert!(matches!(result, Err(AurisError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_sample_rate() {
        let mut config = Config::default();
        config.audio.sample_rate = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("audio.sample_rate"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.audio.silence_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("audio.silence_threshold"));
    }

    #[test]
    fn test_validate_rejects_min_above_max() {
        let mut config = Config::default();
        config.audio.min_audio_length = 40.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("audio.min_audio_length"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.dispatch.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dispatch.timeout_secs"));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_auris_env();

        set_env("AURIS_AUDIO_DEVICE", "hw:1,0");
        set_env("AURIS_MODEL", "tiny");
        set_env("AURIS_LANGUAGE", "de");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.audio.device, Some("hw:1,0".to_string()));
        assert_eq!(config.dispatch.model, "tiny");
        assert_eq!(config.dispatch.language, "de");

        clear_auris_env();
    }

    #[test]
    fn test_env_overrides_ignore_empty_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_auris_env();

        set_env("AURIS_MODEL", "");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.dispatch.model, "base");

        clear_auris_env();
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }
}
