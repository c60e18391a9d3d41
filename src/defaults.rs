//! Default configuration constants for auris.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Target sample rate in Hz after normalization.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default capture chunk size in frames per callback.
pub const CHUNK_SIZE: u32 = 1024;

/// Default silence threshold (peak amplitude, 0.0 to 1.0).
///
/// A value of 0.01 is tuned for typical microphone input levels and
/// tolerates ambient room noise without swallowing quiet speech endings.
pub const SILENCE_THRESHOLD: f32 = 0.01;

/// Default continuous silence in seconds that ends a recording.
///
/// 2.0 seconds allows for natural pauses in speech without prematurely
/// ending the recording session.
pub const SILENCE_DURATION_SECS: f32 = 2.0;

/// Hard ceiling on recording length in seconds.
///
/// A recording finalizes at this bound even through uninterrupted speech,
/// so a stuck silence detector can never grow the buffer without limit.
pub const MAX_RECORDING_SECS: f32 = 30.0;

/// Minimum recording length in seconds worth transcribing.
///
/// Manual stops below this discard the buffer; anything shorter is
/// almost always a false trigger or a clipped fragment.
pub const MIN_AUDIO_SECS: f32 = 1.5;

/// Default wake-word confidence threshold (0.0 to 1.0).
pub const WAKE_THRESHOLD: f32 = 0.6;

/// Rolling analysis window for wake detection, in seconds.
pub const WAKE_WINDOW_SECS: f32 = 2.0;

/// Length of the wake snippet seeded into a new recording, in seconds.
///
/// Covers the trigger phrase itself so the dispatched buffer includes it.
pub const WAKE_SNIPPET_SECS: f32 = 0.6;

/// Voice band for the wake heuristic, in Hz.
///
/// Dominant frequency estimates inside this band score as voice-like.
pub const VOICE_BAND_LOW_HZ: f32 = 800.0;
pub const VOICE_BAND_HIGH_HZ: f32 = 2000.0;

/// Default transcription dispatch timeout in seconds.
pub const DISPATCH_TIMEOUT_SECS: u64 = 10;

/// Capacity of the callback-to-consumer frame queue.
///
/// At 1024-frame chunks and 48kHz this buffers roughly 1.4 seconds before
/// the oldest frames start dropping.
pub const FRAME_QUEUE_CAPACITY: usize = 64;

/// TTL for cached device enumeration results, in seconds.
pub const DEVICE_CACHE_TTL_SECS: u64 = 5;

/// Floor for audio level readings in dBFS.
pub const LEVEL_FLOOR_DB: f32 = -60.0;

/// Attempts made when a capture device reports busy at stream open.
pub const DEVICE_BUSY_RETRIES: u32 = 3;

/// Delay between busy-device retries, in milliseconds.
pub const DEVICE_BUSY_RETRY_DELAY_MS: u64 = 100;

/// Default Whisper model name.
///
/// "base" (multilingual) supports auto-detection of any language.
/// Use "base.en" explicitly for English-only optimized transcription.
pub const DEFAULT_MODEL: &str = "base";

/// Default language code for transcription.
///
/// "auto" lets Whisper detect the spoken language automatically.
/// Set to a specific code (e.g., "en", "de") to force a language.
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";
