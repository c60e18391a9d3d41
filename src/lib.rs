//! auris - Always-on audio capture with wake-word triggered transcription.
//!
//! The pipeline listens on a capture or loopback endpoint, watches a rolling
//! window for a wake trigger, records until silence or a duration ceiling,
//! and hands finished recordings to a transcription engine under a deadline.
//!
//! # Architecture
//!
//! - [`device`]: endpoint enumeration and loopback capability queries
//! - [`capture`]: capture engines, stream-open policy, frame hand-off queue
//! - [`audio`]: frame types, downmix, resampling, level measurement
//! - [`wake`] and [`speech`]: wake detection and the recording state machine
//! - [`dispatch`]: transcription engines and the timeout-guarded dispatcher
//! - [`listener`]: wires the whole pipeline together

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod audio;
pub mod capture;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod speech;
pub mod sys;
pub mod wake;

pub use audio::{AudioFrame, Resampler};
pub use capture::{
    CaptureConfig, CaptureEngine, CaptureMethod, EngineState, FrameQueue, MockCaptureEngine,
    resolve_stream_open,
};
pub use config::Config;
pub use device::{AudioDevice, DeviceEnumerator, Direction, auto_select, devices_to_json};
pub use dispatch::{Dispatcher, TranscriptionEngine, TranscriptionResult};
pub use error::{AurisError, Result};
pub use listener::{Listener, ListenerHandle};
pub use speech::{ListenState, SpeechEvent, SpeechStateMachine};
pub use wake::{WakeWordDetection, WakeWordDetector};

/// Version string including the short git hash when built from a checkout.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    format!("{} ({})", version, git_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_contains_package_version() {
        assert!(version_string().contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_version_string_has_hash_suffix() {
        let version = version_string();
        assert!(version.ends_with(')'));
        assert!(version.contains('('));
    }
}
