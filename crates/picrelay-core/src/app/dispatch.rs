//! DispatchPolicy - 1 件の DeliveryItem をどう送るか
//!
//! # フロー（Single）
//! 1. 画像をダウンロード
//! 2. caption が上限超過なら、先に全文をテキストで送る（結果は成否判定に含めない）
//! 3. 画像を送る（超過時は caption なし）→ この結果が成否
//!
//! # フロー（Batch）
//! 1. 全画像をダウンロード
//! 2. caption は先頭要素にだけ付ける。上限超過ならテキストで先に送り、batch には caption を一切付けない
//! 3. batch を 1 回で送る → この結果が成否
//!
//! Errors stop here: `send` reports a plain `bool` and logs the cause.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{CAPTION_LIMIT, Caption, DeliveryError, DeliveryItem, ImageRef, Payload};
use crate::ports::{ImageFetcher, MediaPart, Transport};

pub struct DispatchPolicy {
    transport: Arc<dyn Transport>,
    fetcher: Arc<dyn ImageFetcher>,
    caption_limit: usize,
}

impl DispatchPolicy {
    pub fn new(transport: Arc<dyn Transport>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            transport,
            fetcher,
            caption_limit: CAPTION_LIMIT,
        }
    }

    pub fn with_caption_limit(mut self, caption_limit: usize) -> Self {
        self.caption_limit = caption_limit;
        self
    }

    /// One delivery attempt. `true` only if the media send itself succeeded.
    pub async fn send(&self, item: &DeliveryItem) -> bool {
        let result = match &item.payload {
            Payload::Single(image) => self.send_single(image).await,
            Payload::Batch(images) => self.send_batch(images).await,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    item_id = %item.id,
                    kind = ?e.kind(),
                    error = %e,
                    "delivery attempt failed"
                );
                false
            }
        }
    }

    async fn send_single(&self, image: &ImageRef) -> Result<(), DeliveryError> {
        let bytes = self.fetcher.fetch(&image.image_url).await?;
        let caption = Caption::compose(&image.caption, &image.source_label);

        let caption = if caption.fits(self.caption_limit) {
            Some(caption.into_string())
        } else {
            self.send_overflow(&caption).await;
            None
        };

        self.transport.send_photo(bytes, caption).await?;
        info!(url = %image.image_url, "image delivered");
        Ok(())
    }

    async fn send_batch(&self, images: &[ImageRef]) -> Result<(), DeliveryError> {
        let Some(first) = images.first() else {
            return Err(DeliveryError::EmptyBatch);
        };

        let mut parts = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            info!(
                index = i + 1,
                total = images.len(),
                url = %image.image_url,
                "downloading batch image"
            );
            parts.push(MediaPart::new(self.fetcher.fetch(&image.image_url).await?));
        }

        // caption は先頭だけ。2 枚目以降には入力に関係なく付けない
        let caption = Caption::compose(&first.caption, &first.source_label);
        if caption.fits(self.caption_limit) {
            parts[0].caption = Some(caption.into_string());
        } else {
            self.send_overflow(&caption).await;
        }

        self.transport.send_media_group(parts).await?;
        info!(images = images.len(), "batch delivered");
        Ok(())
    }

    /// Oversized caption goes out as its own text message. Its outcome does
    /// not decide the attempt.
    async fn send_overflow(&self, caption: &Caption) {
        info!(
            chars = caption.len(),
            limit = self.caption_limit,
            "caption over limit, sending as separate text"
        );
        if let Err(e) = self.transport.send_text(caption.as_str()).await {
            warn!(kind = ?e.kind(), error = %e, "overflow caption text failed");
        }
    }
}
