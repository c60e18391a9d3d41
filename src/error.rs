//! Error types for auris.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AurisError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Device errors
    #[error("Audio device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Audio device busy or locked: {device}")]
    DeviceLocked { device: String },

    #[error("Audio device disconnected: {device}")]
    DeviceDisconnected { device: String },

    #[error("No loopback-capable devices available")]
    NoLoopbackDevices,

    #[error("Audio format unsupported: {detail}")]
    FormatUnsupported { detail: String },

    // Capture errors
    #[error("Capture already running")]
    AlreadyCapturing,

    #[error("Audio capture failed: {message}")]
    CaptureFailed { message: String },

    #[error("Capture stream callback error: {message}")]
    CaptureCallback { message: String },

    #[error("Frame queue overrun: dropped {dropped} frames")]
    BufferOverrun { dropped: u64 },

    // Transcription errors
    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Transcription timed out after {seconds}s")]
    TranscriptionTimeout { seconds: u64 },

    #[error("Transcription engine failed: {message}")]
    TranscriptionEngine { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl AurisError {
    /// True for failures where retrying the same operation may succeed
    /// (device held by another process, transient stream errors).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AurisError::DeviceLocked { .. } | AurisError::CaptureCallback { .. }
        )
    }

    /// True for failures that abort one transcription cycle but must leave
    /// the listening pipeline running.
    pub fn is_cycle_scoped(&self) -> bool {
        matches!(
            self,
            AurisError::TranscriptionTimeout { .. } | AurisError::TranscriptionEngine { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, AurisError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_file_not_found_display() {
        let error = AurisError::ConfigFileNotFound {
            path: "/path/to/config.toml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found at /path/to/config.toml"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = AurisError::ConfigInvalidValue {
            key: "sample_rate".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for sample_rate: must be positive"
        );
    }

    #[test]
    fn test_device_not_found_display() {
        let error = AurisError::DeviceNotFound {
            device: "default".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: default");
    }

    #[test]
    fn test_device_locked_display() {
        let error = AurisError::DeviceLocked {
            device: "Speakers".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device busy or locked: Speakers");
    }

    #[test]
    fn test_no_loopback_devices_display() {
        let error = AurisError::NoLoopbackDevices;
        assert_eq!(error.to_string(), "No loopback-capable devices available");
    }

    #[test]
    fn test_format_unsupported_display() {
        let error = AurisError::FormatUnsupported {
            detail: "f32 at 16kHz".to_string(),
        };
        assert_eq!(error.to_string(), "Audio format unsupported: f32 at 16kHz");
    }

    #[test]
    fn test_already_capturing_display() {
        let error = AurisError::AlreadyCapturing;
        assert_eq!(error.to_string(), "Capture already running");
    }

    #[test]
    fn test_buffer_overrun_display() {
        let error = AurisError::BufferOverrun { dropped: 12 };
        assert_eq!(error.to_string(), "Frame queue overrun: dropped 12 frames");
    }

    #[test]
    fn test_transcription_timeout_display() {
        let error = AurisError::TranscriptionTimeout { seconds: 10 };
        assert_eq!(error.to_string(), "Transcription timed out after 10s");
    }

    #[test]
    fn test_transcription_engine_display() {
        let error = AurisError::TranscriptionEngine {
            message: "out of memory".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transcription engine failed: out of memory"
        );
    }

    #[test]
    fn test_other_display() {
        let error = AurisError::Other("unexpected error".to_string());
        assert_eq!(error.to_string(), "unexpected error");
    }

    #[test]
    fn test_is_retryable() {
        assert!(
            AurisError::DeviceLocked {
                device: "hw:0".to_string()
            }
            .is_retryable()
        );
        assert!(
            AurisError::CaptureCallback {
                message: "xrun".to_string()
            }
            .is_retryable()
        );
        assert!(!AurisError::AlreadyCapturing.is_retryable());
        assert!(!AurisError::NoLoopbackDevices.is_retryable());
    }

    #[test]
    fn test_is_cycle_scoped() {
        assert!(AurisError::TranscriptionTimeout { seconds: 10 }.is_cycle_scoped());
        assert!(
            AurisError::TranscriptionEngine {
                message: "oom".to_string()
            }
            .is_cycle_scoped()
        );
        assert!(
            !AurisError::DeviceLocked {
                device: "hw:0".to_string()
            }
            .is_cycle_scoped()
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: AurisError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: AurisError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);

        fn returns_error() -> Result<i32> {
            Err(AurisError::Other("test error".to_string()))
        }
        assert!(returns_error().is_err());
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: AurisError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<AurisError>();
        assert_sync::<AurisError>();
    }

    #[test]
    fn test_error_debug_format() {
        let error = AurisError::DeviceNotFound {
            device: "Headset Microphone".to_string(),
        };
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("DeviceNotFound"));
        assert!(debug_str.contains("Headset Microphone"));
    }
}
