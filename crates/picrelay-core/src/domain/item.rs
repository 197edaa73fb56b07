//! DeliveryItem - 配送の単位
//!
//! # ライフサイクル
//! 1. producer API が作成（attempt_count = 0）
//! 2. primary queue → worker loop → (失敗時) retry queue → ...
//! 3. 成功 or リトライ上限超過で破棄（永続化しない）
//!
//! An item is owned by exactly one queue or loop at a time, so it is plain
//! data with no interior mutability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ItemId;

/// One image to deliver: where to fetch it and what to say about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub image_url: String,
    pub caption: String,
    pub source_label: String,
}

impl ImageRef {
    pub fn new(
        image_url: impl Into<String>,
        caption: impl Into<String>,
        source_label: impl Into<String>,
    ) -> Self {
        Self {
            image_url: image_url.into(),
            caption: caption.into(),
            source_label: source_label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    Single,
    Batch,
}

/// What an item carries. A batch is never empty; [`DeliveryItem::batch`] is
/// the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "images", rename_all = "snake_case")]
pub enum Payload {
    Single(ImageRef),
    Batch(Vec<ImageRef>),
}

impl Payload {
    pub fn kind(&self) -> DeliveryKind {
        match self {
            Payload::Single(_) => DeliveryKind::Single,
            Payload::Batch(_) => DeliveryKind::Batch,
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            Payload::Single(_) => 1,
            Payload::Batch(images) => images.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryItem {
    pub id: ItemId,
    pub payload: Payload,

    /// Failed attempts so far. Only ever increases.
    pub attempt_count: u32,

    pub submitted_at: DateTime<Utc>,
}

impl DeliveryItem {
    pub fn single(image: ImageRef) -> Self {
        Self::with_payload(Payload::Single(image))
    }

    /// Returns `None` for an empty list.
    pub fn batch(images: Vec<ImageRef>) -> Option<Self> {
        if images.is_empty() {
            return None;
        }
        Some(Self::with_payload(Payload::Batch(images)))
    }

    fn with_payload(payload: Payload) -> Self {
        Self {
            id: ItemId::generate(),
            payload,
            attempt_count: 0,
            submitted_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> DeliveryKind {
        self.payload.kind()
    }

    /// Record one failed attempt and return the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.attempt_count
    }

    /// First image URL, for log lines.
    pub fn primary_url(&self) -> &str {
        match &self.payload {
            Payload::Single(image) => &image.image_url,
            Payload::Batch(images) => images
                .first()
                .map(|image| image.image_url.as_str())
                .unwrap_or_default(),
        }
    }
}
