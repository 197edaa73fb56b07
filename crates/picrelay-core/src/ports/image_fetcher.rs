//! ImageFetcher port - 画像のダウンロード

use async_trait::async_trait;

use crate::domain::DeliveryError;

/// Resolves an image URL to its bytes before it is handed to a [`Transport`].
///
/// [`Transport`]: crate::ports::Transport
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DeliveryError>;
}
