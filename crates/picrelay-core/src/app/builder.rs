//! CoordinatorBuilder - パイプラインの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - transport / fetcher が未設定なら `build()` が BuildError を返す
//! - それ以外は既定値（リトライ 3 回・30 秒間隔・caption 1024 文字）

use std::sync::Arc;
use std::time::Duration;

use crate::domain::CAPTION_LIMIT;
use crate::ports::{ImageFetcher, Transport};
use crate::queue::RetryPolicy;

use super::coordinator::DeliveryCoordinator;
use super::dispatch::DispatchPolicy;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("no transport configured; call with_transport() before build()")]
    MissingTransport,

    #[error("no image fetcher configured; call with_fetcher() before build()")]
    MissingFetcher,
}

/// # 使用例
/// ```ignore
/// let coordinator = CoordinatorBuilder::new()
///     .with_transport(Arc::new(transport))
///     .with_fetcher(Arc::new(fetcher))
///     .build()?;
/// ```
pub struct CoordinatorBuilder {
    transport: Option<Arc<dyn Transport>>,
    fetcher: Option<Arc<dyn ImageFetcher>>,
    retry_policy: RetryPolicy,
    caption_limit: usize,
    poll_interval: Duration,
    shutdown_timeout: Duration,
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            fetcher: None,
            retry_policy: RetryPolicy::default(),
            caption_limit: CAPTION_LIMIT,
            poll_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_caption_limit(mut self, caption_limit: usize) -> Self {
        self.caption_limit = caption_limit;
        self
    }

    /// How long a loop waits on an empty queue before re-checking shutdown.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Upper bound on how long `shutdown()` waits for each loop.
    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Validate and start both loops. Must be called inside a tokio runtime.
    pub fn build(self) -> Result<DeliveryCoordinator, BuildError> {
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;
        let fetcher = self.fetcher.ok_or(BuildError::MissingFetcher)?;
        let dispatch = DispatchPolicy::new(Arc::clone(&transport), fetcher)
            .with_caption_limit(self.caption_limit);

        Ok(DeliveryCoordinator::start(
            transport,
            dispatch,
            self.retry_policy,
            self.poll_interval,
            self.shutdown_timeout,
        ))
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{RecordingTransport, StaticFetcher};

    #[tokio::test]
    async fn test_build_success() {
        let coordinator = CoordinatorBuilder::new()
            .with_transport(Arc::new(RecordingTransport::new()))
            .with_fetcher(Arc::new(StaticFetcher::new()))
            .build();
        assert!(coordinator.is_ok());
        coordinator.unwrap().shutdown().await;
    }

    #[tokio::test]
    async fn test_build_missing_transport() {
        let result = CoordinatorBuilder::new()
            .with_fetcher(Arc::new(StaticFetcher::new()))
            .build();
        assert!(matches!(result, Err(BuildError::MissingTransport)));
    }

    #[tokio::test]
    async fn test_build_missing_fetcher() {
        let result = CoordinatorBuilder::new()
            .with_transport(Arc::new(RecordingTransport::new()))
            .build();
        assert!(matches!(result, Err(BuildError::MissingFetcher)));
    }
}
