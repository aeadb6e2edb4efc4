//! Bounded frame queue between the STOMP subscriber and the Enrichment
//! pipeline. Unlike `tokio::sync::mpsc`, a full queue never blocks the
//! sender: pushing past capacity drops the oldest queued frame and reports
//! it, so the subscriber's read loop keeps draining the broker even while
//! enrichment is behind, and only the stalest signal is ever lost.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

struct Shared {
    queue: Mutex<VecDeque<String>>,
    capacity: usize,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

/// Producer half. Cloneable; every subscriber reconnect loop can hold its
/// own handle onto the same queue.
#[derive(Clone)]
pub struct FrameSender(Arc<Shared>);

/// Consumer half. Not cloneable — one pipeline task owns draining it.
pub struct FrameReceiver(Arc<Shared>);

/// Creates a drop-oldest bounded queue of the given capacity.
pub fn bounded_frame_channel(capacity: usize) -> (FrameSender, FrameReceiver) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity)),
        capacity: capacity.max(1),
        notify: Notify::new(),
        dropped: AtomicU64::new(0),
        closed: AtomicBool::new(false),
    });
    (FrameSender(shared.clone()), FrameReceiver(shared))
}

impl FrameSender {
    /// Pushes `frame` onto the queue, dropping the oldest queued frame
    /// first if the queue is already at capacity. Never awaits on a full
    /// queue. Returns `true` when a frame was dropped to make room.
    pub async fn push(&self, frame: String) -> bool {
        let mut queue = self.0.queue.lock().await;
        let dropped_oldest = if queue.len() >= self.0.capacity {
            queue.pop_front();
            true
        } else {
            false
        };
        queue.push_back(frame);
        drop(queue);

        if dropped_oldest {
            self.0.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.0.notify.notify_one();
        dropped_oldest
    }

    /// Signals the receiver that no further frames are coming, so a
    /// pending `recv` returns `None` once the queue drains.
    pub fn close(&self) {
        self.0.closed.store(true, Ordering::Release);
        self.0.notify.notify_waiters();
    }
}

impl FrameReceiver {
    /// Awaits the next frame, or `None` once the sender side has closed
    /// and the queue is empty.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            {
                let mut queue = self.0.queue.lock().await;
                if let Some(frame) = queue.pop_front() {
                    return Some(frame);
                }
                if self.0.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.0.notify.notified().await;
        }
    }

    /// Drains and returns the number of frames dropped for capacity since
    /// the last call. Callers fold this into their own failure counters.
    pub fn take_dropped(&self) -> u64 {
        self.0.dropped.swap(0, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_latest_and_reports_the_drop_when_full() {
        let (tx, mut rx) = bounded_frame_channel(2);
        assert!(!tx.push("a".to_string()).await);
        assert!(!tx.push("b".to_string()).await);
        assert!(tx.push("c".to_string()).await);

        assert_eq!(rx.recv().await, Some("b".to_string()));
        assert_eq!(rx.recv().await, Some("c".to_string()));
        assert_eq!(rx.take_dropped(), 1);
    }

    #[tokio::test]
    async fn recv_returns_none_after_close_and_drain() {
        let (tx, mut rx) = bounded_frame_channel(4);
        tx.push("only".to_string()).await;
        tx.close();

        assert_eq!(rx.recv().await, Some("only".to_string()));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn recv_wakes_once_a_frame_is_pushed() {
        let (tx, mut rx) = bounded_frame_channel(4);
        let waiter = tokio::spawn(async move { rx.recv().await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tx.push("late".to_string()).await;

        let received = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, Some("late".to_string()));
    }
}
