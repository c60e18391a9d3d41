//! Transcription engines and the timeout-guarded dispatcher.

pub mod whisper;

use crate::error::{AurisError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A finished transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    /// Engine-reported confidence in [0, 1].
    pub confidence: f32,
    /// Length of the transcribed audio in seconds.
    pub duration_secs: f32,
    /// When the recording started, milliseconds since the epoch.
    pub timestamp_ms: u64,
}

/// Turns audio into text. Implementations must be safe to call from a
/// worker thread while the capture pipeline keeps running.
pub trait TranscriptionEngine: Send + Sync {
    /// Transcribes mono f32 audio at the given rate.
    fn transcribe(&self, audio: &[f32], sample_rate: u32) -> Result<TranscriptionResult>;

    /// Engine identifier for logging.
    fn name(&self) -> &str;

    /// False while the engine is still loading its model.
    fn is_ready(&self) -> bool;
}

// Allow Arc<T> to be used wherever a TranscriptionEngine is expected
impl<T: TranscriptionEngine + ?Sized> TranscriptionEngine for Arc<T> {
    fn transcribe(&self, audio: &[f32], sample_rate: u32) -> Result<TranscriptionResult> {
        (**self).transcribe(audio, sample_rate)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Runs an engine with a hard deadline.
///
/// A hung or slow engine costs one recording, never the pipeline: timeouts
/// surface as [`AurisError::TranscriptionTimeout`] and the orphaned worker
/// result is discarded when it eventually arrives.
pub struct Dispatcher {
    engine: Arc<dyn TranscriptionEngine>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn TranscriptionEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Blocking dispatch from a worker thread.
    pub fn submit_blocking(
        &self,
        audio: Vec<f32>,
        sample_rate: u32,
        timestamp_ms: u64,
    ) -> Result<TranscriptionResult> {
        let engine = Arc::clone(&self.engine);
        let (tx, rx) = crossbeam_channel::bounded(1);

        std::thread::spawn(move || {
            let result = engine.transcribe(&audio, sample_rate);
            // Receiver may be gone after a timeout; the result is discarded
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result.map(|r| TranscriptionResult {
                timestamp_ms,
                ..r
            }),
            Err(_) => Err(AurisError::TranscriptionTimeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    /// Async dispatch for tokio-based consumers.
    pub async fn submit(
        &self,
        audio: Vec<f32>,
        sample_rate: u32,
        timestamp_ms: u64,
    ) -> Result<TranscriptionResult> {
        let engine = Arc::clone(&self.engine);
        let task =
            tokio::task::spawn_blocking(move || engine.transcribe(&audio, sample_rate));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result.map(|r| TranscriptionResult {
                timestamp_ms,
                ..r
            }),
            Ok(Err(join_error)) => Err(AurisError::TranscriptionEngine {
                message: format!("transcription task panicked: {}", join_error),
            }),
            Err(_) => Err(AurisError::TranscriptionTimeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

/// Scripted engine for tests.
pub struct MockTranscriptionEngine {
    response: String,
    confidence: f32,
    delay: Option<Duration>,
    should_fail: bool,
    ready: bool,
    calls: std::sync::atomic::AtomicU64,
    last_submission: std::sync::Mutex<Option<(usize, u32)>>,
}

impl MockTranscriptionEngine {
    pub fn new() -> Self {
        Self {
            response: "hello world".to_string(),
            confidence: 0.9,
            delay: None,
            should_fail: false,
            ready: true,
            calls: std::sync::atomic::AtomicU64::new(0),
            last_submission: std::sync::Mutex::new(None),
        }
    }

    pub fn with_response(mut self, text: &str) -> Self {
        self.response = text.to_string();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Sleep this long inside `transcribe`, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn with_not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Sample count and rate of the most recent submission.
    pub fn last_submission(&self) -> Option<(usize, u32)> {
        self.last_submission.lock().ok().and_then(|guard| *guard)
    }
}

impl Default for MockTranscriptionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptionEngine for MockTranscriptionEngine {
    fn transcribe(&self, audio: &[f32], sample_rate: u32) -> Result<TranscriptionResult> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Ok(mut guard) = self.last_submission.lock() {
            *guard = Some((audio.len(), sample_rate));
        }

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.should_fail {
            return Err(AurisError::TranscriptionEngine {
                message: "mock engine failure".to_string(),
            });
        }

        let duration_secs = if sample_rate > 0 {
            audio.len() as f32 / sample_rate as f32
        } else {
            0.0
        };

        Ok(TranscriptionResult {
            text: self.response.clone(),
            confidence: self.confidence,
            duration_secs,
            timestamp_ms: 0,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_blocking_returns_result() {
        let engine = Arc::new(MockTranscriptionEngine::new().with_response("turn on the lights"));
        let dispatcher = Dispatcher::new(engine.clone(), Duration::from_secs(10));

        let result = dispatcher
            .submit_blocking(vec![0.1; 16000], 16000, 42)
            .unwrap();

        assert_eq!(result.text, "turn on the lights");
        assert_eq!(result.timestamp_ms, 42);
        assert!((result.duration_secs - 1.0).abs() < 1e-3);
        assert_eq!(engine.call_count(), 1);
        assert_eq!(engine.last_submission(), Some((16000, 16000)));
    }

    #[test]
    fn test_submit_blocking_times_out() {
        let engine =
            Arc::new(MockTranscriptionEngine::new().with_delay(Duration::from_millis(500)));
        let dispatcher = Dispatcher::new(engine, Duration::from_millis(50));

        let err = dispatcher
            .submit_blocking(vec![0.0; 100], 16000, 0)
            .unwrap_err();
        assert!(matches!(err, AurisError::TranscriptionTimeout { .. }));
    }

    #[test]
    fn test_submit_blocking_engine_failure_propagates() {
        let engine = Arc::new(MockTranscriptionEngine::new().with_failure());
        let dispatcher = Dispatcher::new(engine, Duration::from_secs(10));

        let err = dispatcher
            .submit_blocking(vec![0.0; 100], 16000, 0)
            .unwrap_err();
        assert!(matches!(err, AurisError::TranscriptionEngine { .. }));
    }

    #[test]
    fn test_dispatcher_usable_after_timeout() {
        // One slow call must not poison the dispatcher for the next cycle
        let slow = Arc::new(MockTranscriptionEngine::new().with_delay(Duration::from_millis(200)));
        let dispatcher = Dispatcher::new(slow.clone(), Duration::from_millis(50));

        assert!(dispatcher.submit_blocking(vec![0.0; 10], 16000, 0).is_err());

        let fast = Dispatcher::new(
            Arc::new(MockTranscriptionEngine::new().with_response("ok")),
            Duration::from_secs(5),
        );
        let result = fast.submit_blocking(vec![0.0; 10], 16000, 1).unwrap();
        assert_eq!(result.text, "ok");
    }

    #[tokio::test]
    async fn test_async_submit_returns_result() {
        let engine = Arc::new(MockTranscriptionEngine::new().with_response("async path"));
        let dispatcher = Dispatcher::new(engine, Duration::from_secs(10));

        let result = dispatcher.submit(vec![0.1; 8000], 16000, 7).await.unwrap();
        assert_eq!(result.text, "async path");
        assert_eq!(result.timestamp_ms, 7);
    }

    #[tokio::test]
    async fn test_async_submit_times_out() {
        let engine =
            Arc::new(MockTranscriptionEngine::new().with_delay(Duration::from_millis(500)));
        let dispatcher = Dispatcher::new(engine, Duration::from_millis(50));

        let err = dispatcher.submit(vec![0.0; 100], 16000, 0).await.unwrap_err();
        assert!(matches!(err, AurisError::TranscriptionTimeout { seconds: 0 }));
    }

    #[test]
    fn test_mock_not_ready() {
        let engine = MockTranscriptionEngine::new().with_not_ready();
        assert!(!engine.is_ready());
    }

    #[test]
    fn test_arc_blanket_impl() {
        let engine: Arc<dyn TranscriptionEngine> = Arc::new(MockTranscriptionEngine::new());
        assert_eq!(engine.name(), "mock");
        assert!(engine.transcribe(&[0.0; 10], 16000).is_ok());
    }

    #[test]
    fn test_result_serializes() {
        let result = TranscriptionResult {
            text: "hi".to_string(),
            confidence: 0.5,
            duration_secs: 1.25,
            timestamp_ms: 99,
        };
        let json = serde_json::to_string(&result).unwrap();
        let parsed: TranscriptionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}
