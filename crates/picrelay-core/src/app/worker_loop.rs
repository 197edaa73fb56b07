//! WorkerLoop - キューを消費する常駐ループ
//!
//! Two instances run per coordinator:
//! - **primary**: pops new submissions and sends them right away.
//! - **retry**: pops failed items, waits `RetryPolicy::delay`, sends again.
//!
//! Both push failures onto the retry queue while the budget lasts.
//!
//! # 状態
//! - Idle: `pop()` で待機（poll_interval ごとに shutdown を確認）
//! - Processing: 1 件を処理（送信中の呼び出しはキャンセルしない）
//! - Terminating: shutdown 通知を見たら抜ける
//!
//! Each attempt runs in its own tokio task so a panic inside a send only
//! costs that item, never the loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::dispatch::DispatchPolicy;
use crate::domain::DeliveryItem;
use crate::queue::{DeliveryQueue, RetryDecision, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Primary,
    Retry,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Primary => f.write_str("primary"),
            Stage::Retry => f.write_str("retry"),
        }
    }
}

pub struct WorkerLoop {
    stage: Stage,
    source: Arc<DeliveryQueue>,
    retry_queue: Arc<DeliveryQueue>,
    dispatch: Arc<DispatchPolicy>,
    retry_policy: RetryPolicy,
    poll_interval: Duration,
}

impl WorkerLoop {
    pub fn primary(
        primary: Arc<DeliveryQueue>,
        retry: Arc<DeliveryQueue>,
        dispatch: Arc<DispatchPolicy>,
        retry_policy: RetryPolicy,
        poll_interval: Duration,
    ) -> Self {
        Self {
            stage: Stage::Primary,
            source: primary,
            retry_queue: retry,
            dispatch,
            retry_policy,
            poll_interval,
        }
    }

    /// The retry loop consumes and refills the same queue.
    pub fn retry(
        retry: Arc<DeliveryQueue>,
        dispatch: Arc<DispatchPolicy>,
        retry_policy: RetryPolicy,
        poll_interval: Duration,
    ) -> Self {
        Self {
            stage: Stage::Retry,
            source: Arc::clone(&retry),
            retry_queue: retry,
            dispatch,
            retry_policy,
            poll_interval,
        }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(stage = %self.stage, "worker loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            // pop は待つ可能性があるので shutdown と競合させる
            let item = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                item = self.source.pop(self.poll_interval) => item,
            };

            let Some(item) = item else {
                continue;
            };

            let keep_running = self.process(item, &mut shutdown).await;
            self.source.release();
            if !keep_running {
                break;
            }
        }

        info!(stage = %self.stage, "worker loop stopped");
    }

    /// Returns `false` when shutdown interrupted the item.
    async fn process(&self, item: DeliveryItem, shutdown: &mut watch::Receiver<bool>) -> bool {
        if self.stage == Stage::Retry {
            info!(
                item_id = %item.id,
                attempt = item.attempt_count,
                delay_secs = self.retry_policy.delay.as_secs(),
                "waiting before retry"
            );
            tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => {
                    info!(item_id = %item.id, "shutdown during backoff, item dropped");
                    return false;
                }
                _ = tokio::time::sleep(self.retry_policy.delay) => {}
            }
        }

        let item_id = item.id;
        debug!(
            stage = %self.stage,
            item_id = %item_id,
            kind = ?item.kind(),
            attempt = item.attempt_count.saturating_add(1),
            "sending"
        );

        let dispatch = Arc::clone(&self.dispatch);
        let attempt = tokio::spawn(async move {
            let delivered = dispatch.send(&item).await;
            (item, delivered)
        });

        match attempt.await {
            Ok((item, true)) => {
                info!(
                    stage = %self.stage,
                    item_id = %item.id,
                    images = item.payload.image_count(),
                    "delivered"
                );
            }
            Ok((item, false)) => self.handle_failure(item),
            Err(e) => {
                error!(
                    stage = %self.stage,
                    item_id = %item_id,
                    error = %e,
                    "delivery attempt panicked, item dropped"
                );
            }
        }
        true
    }

    fn handle_failure(&self, mut item: DeliveryItem) {
        let attempts = item.record_failure();
        let item_id = item.id;

        match self.retry_policy.decide(attempts) {
            RetryDecision::Retry => {
                let depth = self.retry_queue.push(item);
                info!(
                    stage = %self.stage,
                    item_id = %item_id,
                    attempt = attempts,
                    queue = self.retry_queue.name(),
                    queue_depth = depth,
                    "failed, queued for retry"
                );
            }
            RetryDecision::GiveUp => {
                let age = Utc::now() - item.submitted_at;
                error!(
                    stage = %self.stage,
                    item_id = %item_id,
                    kind = ?item.kind(),
                    images = item.payload.image_count(),
                    url = %item.primary_url(),
                    attempts,
                    age_secs = age.num_seconds(),
                    "max retries exceeded, item dropped"
                );
            }
        }
    }
}

/// Resolves once shutdown is requested or the coordinator is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImageRef;
    use crate::impls::{RecordingTransport, StaticFetcher};

    fn item(n: u32) -> DeliveryItem {
        DeliveryItem::single(ImageRef::new(format!("https://img.example/{n}.png"), "c", "m"))
    }

    fn dispatch(transport: &Arc<RecordingTransport>) -> Arc<DispatchPolicy> {
        Arc::new(DispatchPolicy::new(
            transport.clone(),
            Arc::new(StaticFetcher::new()),
        ))
    }

    fn primary_loop(
        transport: &Arc<RecordingTransport>,
        primary: &Arc<DeliveryQueue>,
        retry: &Arc<DeliveryQueue>,
    ) -> WorkerLoop {
        WorkerLoop::primary(
            primary.clone(),
            retry.clone(),
            dispatch(transport),
            RetryPolicy::default(),
            Duration::from_secs(1),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn primary_failure_moves_item_to_retry_queue() {
        let transport = Arc::new(RecordingTransport::new().fail_media(1));
        let primary = Arc::new(DeliveryQueue::new("primary"));
        let retry = Arc::new(DeliveryQueue::new("retry"));
        let worker = primary_loop(&transport, &primary, &retry);

        let (tx, mut rx) = watch::channel(false);
        let popped = {
            primary.push(item(1));
            primary.try_pop().unwrap()
        };
        assert!(worker.process(popped, &mut rx).await);
        primary.release();

        assert_eq!(primary.snapshot().in_flight, 0);
        let requeued = retry.try_pop().unwrap();
        assert_eq!(requeued.attempt_count, 1);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_item_is_not_requeued() {
        let transport = Arc::new(RecordingTransport::new().fail_media_always());
        let primary = Arc::new(DeliveryQueue::new("primary"));
        let retry = Arc::new(DeliveryQueue::new("retry"));
        let worker = primary_loop(&transport, &primary, &retry);

        let mut tired = item(1);
        tired.attempt_count = 3;
        worker.handle_failure(tired);

        assert!(retry.is_empty());
        assert!(primary.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn saturated_attempt_count_does_not_overflow() {
        let transport = Arc::new(RecordingTransport::new().fail_media(1));
        let primary = Arc::new(DeliveryQueue::new("primary"));
        let retry = Arc::new(DeliveryQueue::new("retry"));
        let worker = WorkerLoop::primary(
            primary.clone(),
            retry.clone(),
            dispatch(&transport),
            RetryPolicy::new(u32::MAX, Duration::from_secs(30)),
            Duration::from_secs(1),
        );

        let (_tx, mut rx) = watch::channel(false);
        let mut worn = item(1);
        worn.attempt_count = u32::MAX;
        assert!(worker.process(worn, &mut rx).await);

        let requeued = retry.try_pop().unwrap();
        assert_eq!(requeued.attempt_count, u32::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_sender_dropped() {
        let transport = Arc::new(RecordingTransport::new());
        let primary = Arc::new(DeliveryQueue::new("primary"));
        let retry = Arc::new(DeliveryQueue::new("retry"));
        let worker = primary_loop(&transport, &primary, &retry);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop should stop")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn retry_backoff_is_interrupted_by_shutdown() {
        let transport = Arc::new(RecordingTransport::new());
        let retry = Arc::new(DeliveryQueue::new("retry"));
        let worker = WorkerLoop::retry(
            retry.clone(),
            dispatch(&transport),
            RetryPolicy::default(),
            Duration::from_secs(1),
        );

        let (tx, rx) = watch::channel(false);
        retry.push(item(1));
        let handle = tokio::spawn(worker.run(rx));

        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // backoff 中に止めたので送信は一度も起きない
        assert!(transport.calls().is_empty());
        assert_eq!(retry.snapshot().in_flight, 0);
    }
}
