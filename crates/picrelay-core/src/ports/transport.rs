//! Transport port - リモートのメッセージングサービスへの送信
//!
//! One method per logical send. Implementations own request construction,
//! timeouts and authentication; the core only looks at `Ok`/`Err`.
//!
//! # 設計原則
//! - 1 回の呼び出し = 1 回の送信（内部でリトライしない）
//! - リトライは queue レベルでのみ行う

use async_trait::async_trait;

use crate::domain::DeliveryError;

/// One element of a media batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPart {
    pub image: Vec<u8>,
    pub caption: Option<String>,
}

impl MediaPart {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            caption: None,
        }
    }
}

/// Transport は送信先（固定の 1 会話）への送信を抽象化
///
/// # Thread Safety
/// - `Send + Sync` を要求（worker loop ごとに共有される）
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one image. `None` means no caption at all.
    async fn send_photo(&self, image: Vec<u8>, caption: Option<String>)
    -> Result<(), DeliveryError>;

    async fn send_text(&self, text: &str) -> Result<(), DeliveryError>;

    /// Send all parts in one call, in order.
    async fn send_media_group(&self, parts: Vec<MediaPart>) -> Result<(), DeliveryError>;

    /// Cheap reachability/auth check. Returns a display name for the sender.
    async fn check_connection(&self) -> Result<String, DeliveryError>;
}
