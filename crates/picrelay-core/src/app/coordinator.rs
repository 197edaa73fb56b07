//! DeliveryCoordinator - producer 向けの API
//!
//! Owns both queues and both loops. Producers only ever push onto the primary
//! queue, which never waits on the network. There is no global instance:
//! whoever builds the coordinator passes the handle around.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::builder::CoordinatorBuilder;
use super::dispatch::DispatchPolicy;
use super::status::{QueueStatus, ShutdownReport};
use super::worker_loop::{Stage, WorkerLoop};
use crate::config::{ConfigOverrides, TelegramConfig};
use crate::domain::caption::with_seed;
use crate::domain::{DeliveryError, DeliveryItem, ImageRef, ItemId};
use crate::error::PicrelayError;
use crate::impls::{HttpImageFetcher, TelegramTransport};
use crate::ports::Transport;
use crate::queue::{DeliveryQueue, RetryPolicy};

pub struct DeliveryCoordinator {
    primary: Arc<DeliveryQueue>,
    retry: Arc<DeliveryQueue>,
    transport: Arc<dyn Transport>,
    // drop されるとループ側の changed() が Err になり停止する
    shutdown_tx: watch::Sender<bool>,
    primary_join: JoinHandle<()>,
    retry_join: JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl DeliveryCoordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    pub(crate) fn start(
        transport: Arc<dyn Transport>,
        dispatch: DispatchPolicy,
        retry_policy: RetryPolicy,
        poll_interval: Duration,
        shutdown_timeout: Duration,
    ) -> Self {
        let primary = Arc::new(DeliveryQueue::new("primary"));
        let retry = Arc::new(DeliveryQueue::new("retry"));
        let dispatch = Arc::new(dispatch);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let primary_loop = WorkerLoop::primary(
            Arc::clone(&primary),
            Arc::clone(&retry),
            Arc::clone(&dispatch),
            retry_policy.clone(),
            poll_interval,
        );
        let retry_loop = WorkerLoop::retry(Arc::clone(&retry), dispatch, retry_policy, poll_interval);

        let primary_join = tokio::spawn(primary_loop.run(shutdown_rx.clone()));
        let retry_join = tokio::spawn(retry_loop.run(shutdown_rx));

        info!("delivery coordinator started");
        Self {
            primary,
            retry,
            transport,
            shutdown_tx,
            primary_join,
            retry_join,
            shutdown_timeout,
        }
    }

    /// Production wiring: Bot API transport, HTTP downloads, default policy.
    ///
    /// A failed health check is logged as a warning; the coordinator is
    /// returned either way.
    pub async fn telegram(config: TelegramConfig) -> Result<Self, PicrelayError> {
        info!(
            chat_id = %config.chat_id,
            api = %config.api_base_url,
            "telegram configuration loaded"
        );
        let fetcher = HttpImageFetcher::new(config.download_timeout)?;
        let transport = TelegramTransport::new(config)?;
        let coordinator = Self::builder()
            .with_transport(Arc::new(transport))
            .with_fetcher(Arc::new(fetcher))
            .build()?;

        if coordinator.health_check().await {
            info!("telegram delivery ready");
        } else {
            warn!("telegram delivery started but the connection test failed");
        }
        Ok(coordinator)
    }

    /// [`telegram`](Self::telegram) with the config read from the
    /// environment, `overrides` taking precedence.
    pub async fn telegram_from_env(overrides: ConfigOverrides) -> Result<Self, PicrelayError> {
        let config = TelegramConfig::from_env_with(overrides)?;
        Self::telegram(config).await
    }

    /// Queue one image. Returns immediately.
    pub fn submit_image(&self, image_url: &str, caption: &str, source_label: &str) -> ItemId {
        self.enqueue(DeliveryItem::single(ImageRef::new(
            image_url,
            caption,
            source_label,
        )))
    }

    /// One independent single delivery per image, in input order.
    pub fn submit_images(&self, images: Vec<ImageRef>) -> Vec<ItemId> {
        images
            .into_iter()
            .map(|image| self.enqueue(DeliveryItem::single(image)))
            .collect()
    }

    /// Queue all images as one batch (one media-group send).
    pub fn submit_batch(&self, images: Vec<ImageRef>) -> Result<ItemId, DeliveryError> {
        let item = DeliveryItem::batch(images).ok_or(DeliveryError::EmptyBatch)?;
        Ok(self.enqueue(item))
    }

    /// Deliver freshly generated images: one URL goes out as a single image,
    /// several as one batch. `seeds[i]` is appended to the caption of image
    /// `i` when present.
    pub fn submit_generated<S: AsRef<str>>(
        &self,
        image_urls: &[S],
        prompt: &str,
        source_label: &str,
        seeds: &[u64],
    ) -> Option<ItemId> {
        match image_urls {
            [] => {
                warn!("no generated images to deliver");
                None
            }
            [url] => {
                let caption = with_seed(prompt, seeds.first().copied());
                Some(self.submit_image(url.as_ref(), &caption, source_label))
            }
            urls => {
                let images = urls
                    .iter()
                    .enumerate()
                    .map(|(i, url)| {
                        ImageRef::new(
                            url.as_ref(),
                            with_seed(prompt, seeds.get(i).copied()),
                            source_label,
                        )
                    })
                    .collect();
                self.submit_batch(images).ok()
            }
        }
    }

    fn enqueue(&self, item: DeliveryItem) -> ItemId {
        let id = item.id;
        let kind = item.kind();
        let images = item.payload.image_count();
        let depth = self.primary.push(item);
        info!(
            item_id = %id,
            ?kind,
            images,
            queue = self.primary.name(),
            queue_depth = depth,
            "queued for delivery"
        );
        id
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus::from_snapshots(self.primary.snapshot(), self.retry.snapshot())
    }

    /// Test the transport connection once. Meant for startup; the delivery path never
    /// calls it.
    pub async fn health_check(&self) -> bool {
        match self.transport.check_connection().await {
            Ok(name) => {
                info!(bot = %name, "transport connection ok");
                true
            }
            Err(e) => {
                error!(kind = ?e.kind(), error = %e, "transport connection test failed");
                false
            }
        }
    }

    /// Stop both loops and drop whatever is still queued.
    ///
    /// In-flight sends are allowed to finish within `shutdown_timeout`; a loop
    /// that takes longer is left to finish on its own and reported as not
    /// stopped.
    pub async fn shutdown(self) -> ShutdownReport {
        info!(status = %self.status(), "shutting down delivery coordinator");
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);

        let deadline = Instant::now() + self.shutdown_timeout;
        let primary_stopped = join_by(self.primary_join, deadline, Stage::Primary).await;
        let retry_stopped = join_by(self.retry_join, deadline, Stage::Retry).await;

        let discarded = self.primary.clear() + self.retry.clear();
        if discarded > 0 {
            warn!(discarded, "queued items dropped at shutdown");
        }

        let report = ShutdownReport {
            primary_stopped,
            retry_stopped,
            discarded,
        };
        info!(?report, "delivery coordinator shut down");
        report
    }
}

async fn join_by(handle: JoinHandle<()>, deadline: Instant, stage: Stage) -> bool {
    match tokio::time::timeout_at(deadline, handle).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(%stage, error = %e, "worker loop ended abnormally");
            true
        }
        Err(_) => {
            warn!(%stage, "worker loop did not stop before the shutdown timeout");
            false
        }
    }
}
