//! HttpImageFetcher - reqwest でのダウンロード

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::domain::DeliveryError;
use crate::ports::ImageFetcher;

pub struct HttpImageFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .build()
            .map_err(|e| DeliveryError::Http(e.without_url()))?;
        Ok(Self::with_client(client, timeout))
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DeliveryError> {
        let failed = |reason: String| DeliveryError::Fetch {
            url: url.to_string(),
            reason,
        };

        debug!(url, "downloading image");
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.without_url().to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| failed(e.without_url().to_string()))?;
        Ok(bytes.to_vec())
    }
}
