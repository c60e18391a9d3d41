//! Capture engines and the policy for opening streams.

#[cfg(feature = "cpal-audio")]
pub mod cpal_engine;
pub mod engine;
pub mod queue;
pub mod wav;

pub use engine::{CaptureEngine, ErrorCallback, FrameCallback, MockCaptureEngine};
pub use queue::FrameQueue;

use crate::defaults;
use crate::device::Direction;
use crate::error::{AurisError, Result};
use serde::{Deserialize, Serialize};

/// How audio is acquired from the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMethod {
    /// Open a capture endpoint directly (microphones).
    Direct,
    /// Capture what a render endpoint is playing (WASAPI loopback).
    Loopback,
    /// macOS audio tap on a process or device.
    AudioTap,
    /// macOS aggregate device combining endpoints.
    AggregateDevice,
}

/// Parameters for starting a capture engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Endpoint ID from enumeration; `None` lets the backend pick a default.
    pub device_id: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size: u32,
    pub method: CaptureMethod,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            sample_rate: defaults::SAMPLE_RATE,
            channels: 1,
            buffer_size: defaults::CHUNK_SIZE,
            method: CaptureMethod::Direct,
        }
    }
}

/// Lifecycle of a capture engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Initializing,
    Running,
    Stopping,
    Error,
}

/// Resolved parameters for opening a stream on a concrete device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOpen {
    /// Direction the stream is opened in. Always `Capture`; loopback reads
    /// a render endpoint through a capture-direction stream.
    pub direction: Direction,
    /// Backend loopback flag, set only for render endpoints.
    pub loopback: bool,
}

/// Resolves how to open a stream for a device.
///
/// The invariant here is the one loopback backends punish you for getting
/// wrong: a render endpoint is never opened in render direction. Loopback
/// capture of playback audio opens the render endpoint as a capture stream
/// with the loopback flag set.
pub fn resolve_stream_open(
    method: CaptureMethod,
    device_direction: Direction,
) -> Result<StreamOpen> {
    match (method, device_direction) {
        (CaptureMethod::Loopback, Direction::Render) => Ok(StreamOpen {
            direction: Direction::Capture,
            loopback: true,
        }),
        // Monitor/virtual sources already present playback as a capture
        // endpoint; no backend flag needed.
        (CaptureMethod::Loopback, Direction::Capture) => Ok(StreamOpen {
            direction: Direction::Capture,
            loopback: false,
        }),
        (CaptureMethod::Direct, Direction::Capture) => Ok(StreamOpen {
            direction: Direction::Capture,
            loopback: false,
        }),
        (CaptureMethod::Direct, Direction::Render) => Err(AurisError::ConfigInvalidValue {
            key: "capture.method".to_string(),
            message: "render endpoints require the Loopback method".to_string(),
        }),
        (CaptureMethod::AudioTap | CaptureMethod::AggregateDevice, _) => Ok(StreamOpen {
            direction: Direction::Capture,
            loopback: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_loopback_opens_capture_with_flag() {
        let open = resolve_stream_open(CaptureMethod::Loopback, Direction::Render).unwrap();
        assert_eq!(open.direction, Direction::Capture);
        assert!(open.loopback);
    }

    #[test]
    fn test_capture_loopback_opens_capture_without_flag() {
        let open = resolve_stream_open(CaptureMethod::Loopback, Direction::Capture).unwrap();
        assert_eq!(open.direction, Direction::Capture);
        assert!(!open.loopback);
    }

    #[test]
    fn test_direct_capture() {
        let open = resolve_stream_open(CaptureMethod::Direct, Direction::Capture).unwrap();
        assert_eq!(open.direction, Direction::Capture);
        assert!(!open.loopback);
    }

    #[test]
    fn test_direct_on_render_is_config_error() {
        let err = resolve_stream_open(CaptureMethod::Direct, Direction::Render).unwrap_err();
        assert!(err.to_string().contains("capture.method"));
    }

    #[test]
    fn test_resolved_direction_is_never_render() {
        let methods = [
            CaptureMethod::Direct,
            CaptureMethod::Loopback,
            CaptureMethod::AudioTap,
            CaptureMethod::AggregateDevice,
        ];
        let directions = [Direction::Capture, Direction::Render];

        for method in methods {
            for direction in directions {
                if let Ok(open) = resolve_stream_open(method, direction) {
                    assert_eq!(
                        open.direction,
                        Direction::Capture,
                        "{:?} on {:?} resolved to render direction",
                        method,
                        direction
                    );
                }
            }
        }
    }

    #[test]
    fn test_macos_methods_resolve_to_plain_capture() {
        for method in [CaptureMethod::AudioTap, CaptureMethod::AggregateDevice] {
            let open = resolve_stream_open(method, Direction::Render).unwrap();
            assert_eq!(open.direction, Direction::Capture);
            assert!(!open.loopback);
        }
    }

    #[test]
    fn test_capture_config_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.device_id, None);
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.method, CaptureMethod::Direct);
    }
}
