//! In-memory FIFO used for both the primary and the retry queue.
//!
//! # 実装詳細
//! - `std::sync::Mutex<VecDeque>`: push は同期・非ブロッキング（producer を待たせない）
//! - `tokio::sync::Notify`: pop 側は通知 or timeout まで効率よく待つ
//! - in_flight: pop された後、loop が `release()` するまで数える
//!
//! Depth and in-flight live under the same lock so a snapshot never shows an
//! item that is in neither place.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::domain::DeliveryItem;

#[derive(Default)]
struct QueueState {
    items: VecDeque<DeliveryItem>,
    in_flight: usize,
}

/// Point-in-time view of one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub depth: usize,
    pub in_flight: usize,
}

pub struct DeliveryQueue {
    name: &'static str,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl DeliveryQueue {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Append an item. Never blocks on anything but the (short) state lock.
    /// Returns the depth after the push.
    pub fn push(&self, item: DeliveryItem) -> usize {
        let depth = {
            let mut state = self.lock();
            state.items.push_back(item);
            state.items.len()
        };
        // 待機中の consumer を起こす（いなければ permit が残る）
        self.notify.notify_one();
        depth
    }

    /// Take the oldest item, waiting up to `timeout` for one to arrive.
    ///
    /// A returned item counts as in flight until [`release`](Self::release).
    pub async fn pop(&self, timeout: Duration) -> Option<DeliveryItem> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                // 最後にもう一度だけ確認してから諦める
                return self.try_pop();
            }
        }
    }

    pub fn try_pop(&self) -> Option<DeliveryItem> {
        let mut state = self.lock();
        let item = state.items.pop_front()?;
        state.in_flight += 1;
        Some(item)
    }

    /// The loop is done with an item it popped from this queue.
    pub fn release(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.lock();
        QueueSnapshot {
            depth: state.items.len(),
            in_flight: state.in_flight,
        }
    }

    /// Drop everything still queued. Returns how many items were lost.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.items.len();
        state.items.clear();
        dropped
    }

    // 各操作の後で state は常に整合しているので poison は無視してよい
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImageRef;
    use std::sync::Arc;

    fn item(n: u32) -> DeliveryItem {
        DeliveryItem::single(ImageRef::new(format!("https://img.example/{n}.png"), "c", "m"))
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = DeliveryQueue::new("primary");
        let a = item(1);
        let b = item(2);
        queue.push(a.clone());
        assert_eq!(queue.push(b.clone()), 2);

        assert_eq!(queue.pop(Duration::from_secs(1)).await, Some(a));
        assert_eq!(queue.pop(Duration::from_secs(1)).await, Some(b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_timeout() {
        let queue = DeliveryQueue::new("primary");
        let start = Instant::now();
        let popped = queue.pop(Duration::from_millis(500)).await;
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert_eq!(popped, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_wakes_pop() {
        let queue = Arc::new(DeliveryQueue::new("retry"));
        let expected = item(1);

        let pop_future = tokio::spawn({
            let queue = queue.clone();
            async move { queue.pop(Duration::from_secs(5)).await }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        queue.push(expected.clone());

        assert_eq!(pop_future.await.unwrap(), Some(expected));
    }

    #[tokio::test]
    async fn test_snapshot_tracks_in_flight() {
        let queue = DeliveryQueue::new("primary");
        queue.push(item(1));
        queue.push(item(2));
        assert_eq!(queue.snapshot(), QueueSnapshot { depth: 2, in_flight: 0 });

        let _ = queue.try_pop().unwrap();
        assert_eq!(queue.snapshot(), QueueSnapshot { depth: 1, in_flight: 1 });

        queue.release();
        assert_eq!(queue.snapshot(), QueueSnapshot { depth: 1, in_flight: 0 });
    }

    #[test]
    fn test_clear_reports_dropped() {
        let queue = DeliveryQueue::new("primary");
        queue.push(item(1));
        queue.push(item(2));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
