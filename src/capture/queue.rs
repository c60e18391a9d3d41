//! Bounded hand-off queue between the capture callback and the consumer
//! thread.
//!
//! The producer side never blocks: when the consumer falls behind and the
//! queue fills, the OLDEST frame is dropped and counted. Stale audio is
//! worthless for a live pipeline; a stalled capture callback is worse.

use crate::audio::AudioFrame;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub struct FrameQueue {
    inner: Mutex<VecDeque<AudioFrame>>,
    available: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueues a frame, evicting the oldest one when full. Never blocks
    /// beyond the internal lock; safe to call from the stream callback.
    pub fn push(&self, frame: AudioFrame) {
        let mut queue = match self.inner.lock() {
            Ok(guard) => guard,
            // A poisoned queue means a consumer panicked; dropping the frame
            // is the only non-blocking option left.
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        if queue.len() == self.capacity {
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(frame);
        drop(queue);
        self.available.notify_one();
    }

    /// Dequeues the oldest frame, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<AudioFrame> {
        let mut queue = self.inner.lock().ok()?;
        if queue.is_empty() {
            let (guard, _) = self.available.wait_timeout(queue, timeout).ok()?;
            queue = guard;
        }
        queue.pop_front()
    }

    /// Non-blocking dequeue.
    pub fn try_pop(&self) -> Option<AudioFrame> {
        self.inner.lock().ok()?.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total frames evicted since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn frame(sequence: u64) -> AudioFrame {
        AudioFrame::new(vec![0.0; 4], 16000, 1, sequence)
    }

    #[test]
    fn test_push_pop_fifo_order() {
        let queue = FrameQueue::new(8);
        queue.push(frame(0));
        queue.push(frame(1));
        queue.push(frame(2));

        assert_eq!(queue.try_pop().unwrap().sequence, 0);
        assert_eq!(queue.try_pop().unwrap().sequence, 1);
        assert_eq!(queue.try_pop().unwrap().sequence, 2);
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_overrun_drops_oldest_and_counts() {
        let queue = FrameQueue::new(3);
        for seq in 0..5 {
            queue.push(frame(seq));
        }

        assert_eq!(queue.dropped(), 2);
        assert_eq!(queue.len(), 3);
        // Sequences 0 and 1 were evicted
        assert_eq!(queue.try_pop().unwrap().sequence, 2);
        assert_eq!(queue.try_pop().unwrap().sequence, 3);
        assert_eq!(queue.try_pop().unwrap().sequence, 4);
    }

    #[test]
    fn test_push_never_blocks_when_full() {
        let queue = FrameQueue::new(1);
        queue.push(frame(0));
        // Would deadlock here if push blocked on a full queue
        queue.push(frame(1));
        assert_eq!(queue.try_pop().unwrap().sequence, 1);
    }

    #[test]
    fn test_pop_timeout_returns_none_when_empty() {
        let queue = FrameQueue::new(4);
        let start = std::time::Instant::now();
        assert!(queue.pop_timeout(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_pop_timeout_wakes_on_push() {
        let queue = Arc::new(FrameQueue::new(4));
        let producer_queue = Arc::clone(&queue);

        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer_queue.push(frame(7));
        });

        let popped = queue.pop_timeout(Duration::from_secs(2));
        producer.join().unwrap();

        assert_eq!(popped.unwrap().sequence, 7);
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let queue = FrameQueue::new(0);
        queue.push(frame(0));
        assert_eq!(queue.len(), 1);
    }
}
