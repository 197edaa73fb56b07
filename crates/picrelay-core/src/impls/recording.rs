//! RecordingTransport / StaticFetcher - テスト用の実装
//!
//! Nothing leaves the process. `RecordingTransport` remembers every call (with
//! the tokio clock time it started at, so paused-clock tests can check
//! backoff spacing) and can be scripted to fail media sends.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::domain::DeliveryError;
use crate::ports::{ImageFetcher, MediaPart, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Photo {
        image: Vec<u8>,
        caption: Option<String>,
    },
    Text {
        text: String,
    },
    MediaGroup {
        parts: Vec<MediaPart>,
    },
    ConnectionCheck,
}

impl TransportCall {
    /// Photo or media group.
    pub fn is_media(&self) -> bool {
        matches!(self, TransportCall::Photo { .. } | TransportCall::MediaGroup { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: TransportCall,
    pub at: Instant,
}

#[derive(Default)]
struct Script {
    calls: Vec<RecordedCall>,
    /// Media sends left to fail. `u32::MAX` = always.
    media_failures: u32,
    fail_text: bool,
    connection_ok: bool,
    latency: Duration,
}

pub struct RecordingTransport {
    script: Mutex<Script>,
}

impl RecordingTransport {
    /// Every call succeeds.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                connection_ok: true,
                ..Script::default()
            }),
        }
    }

    /// Fail the next `n` photo/media-group sends.
    pub fn fail_media(self, n: u32) -> Self {
        self.lock().media_failures = n;
        self
    }

    pub fn fail_media_always(self) -> Self {
        self.fail_media(u32::MAX)
    }

    pub fn fail_text(self) -> Self {
        self.lock().fail_text = true;
        self
    }

    pub fn fail_connection_check(self) -> Self {
        self.lock().connection_ok = false;
        self
    }

    /// Each media send takes this long (tokio time).
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.iter().map(|c| c.call.clone()).collect()
    }

    pub fn media_calls(&self) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.call.is_media())
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn media(&self, call: TransportCall, method: &'static str) -> Result<(), DeliveryError> {
        let (latency, fail) = {
            let mut script = self.lock();
            script.calls.push(RecordedCall {
                call,
                at: Instant::now(),
            });
            let fail = script.media_failures > 0;
            if fail && script.media_failures != u32::MAX {
                script.media_failures -= 1;
            }
            (script.latency, fail)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if fail {
            return Err(DeliveryError::Api {
                method,
                description: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_photo(
        &self,
        image: Vec<u8>,
        caption: Option<String>,
    ) -> Result<(), DeliveryError> {
        self.media(TransportCall::Photo { image, caption }, "sendPhoto")
            .await
    }

    async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        let mut script = self.lock();
        script.calls.push(RecordedCall {
            call: TransportCall::Text {
                text: text.to_string(),
            },
            at: Instant::now(),
        });
        if script.fail_text {
            return Err(DeliveryError::Api {
                method: "sendMessage",
                description: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    async fn send_media_group(&self, parts: Vec<MediaPart>) -> Result<(), DeliveryError> {
        self.media(TransportCall::MediaGroup { parts }, "sendMediaGroup")
            .await
    }

    async fn check_connection(&self) -> Result<String, DeliveryError> {
        let mut script = self.lock();
        script.calls.push(RecordedCall {
            call: TransportCall::ConnectionCheck,
            at: Instant::now(),
        });
        if script.connection_ok {
            Ok("recording".to_string())
        } else {
            Err(DeliveryError::Api {
                method: "getMe",
                description: "Unauthorized".to_string(),
            })
        }
    }
}

/// Serves the URL's own bytes as the image, so tests can tell images apart.
#[derive(Default)]
pub struct StaticFetcher {
    failing: Mutex<HashSet<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_url(self, url: impl Into<String>) -> Self {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into());
        self
    }
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DeliveryError> {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url);
        if failing {
            return Err(DeliveryError::Fetch {
                url: url.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(url.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_failures_run_out() {
        let transport = RecordingTransport::new().fail_media(1);
        assert!(transport.send_photo(vec![1], None).await.is_err());
        assert!(transport.send_photo(vec![1], None).await.is_ok());
        assert_eq!(transport.media_calls().len(), 2);
    }

    #[tokio::test]
    async fn text_calls_are_not_media() {
        let transport = RecordingTransport::new();
        transport.send_text("hi").await.unwrap();
        assert!(transport.media_calls().is_empty());
        assert_eq!(
            transport.calls(),
            vec![TransportCall::Text {
                text: "hi".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn static_fetcher_echoes_url() {
        let fetcher = StaticFetcher::new().fail_url("https://img.example/bad.png");
        assert_eq!(fetcher.fetch("u").await.unwrap(), b"u".to_vec());
        assert!(fetcher.fetch("https://img.example/bad.png").await.is_err());
    }
}
