//! Audio sample types and normalization.

pub mod frame;
pub mod processor;

pub use frame::{AudioFrame, CircularAudioBuffer, RecordingSession};
pub use processor::{Resampler, downmix_to_mono, is_silent, level_db, peak, remove_dc, rms};
