//! TelegramTransport - Bot API への送信
//!
//! Thin wrapper over `sendPhoto`, `sendMessage`, `sendMediaGroup` and `getMe`.
//! Every request carries its own timeout from [`TelegramConfig`]. Errors are
//! stripped of their URL because the URL contains the bot token.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TelegramConfig;
use crate::domain::DeliveryError;
use crate::ports::{MediaPart, Transport};

/// Bot API reply envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    first_name: String,
    #[serde(default)]
    username: Option<String>,
}

/// One entry of the `media` JSON array of `sendMediaGroup`.
#[derive(Debug, Serialize)]
struct InputMediaPhoto {
    #[serde(rename = "type")]
    kind: &'static str,
    media: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<String>,
}

pub struct TelegramTransport {
    config: TelegramConfig,
    client: Client,
}

impl TelegramTransport {
    pub fn new(config: TelegramConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder().build().map_err(http)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: TelegramConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn photo_part(image: Vec<u8>) -> Result<Part, DeliveryError> {
        Part::bytes(image)
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .map_err(http)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, DeliveryError> {
        let response = request.send().await.map_err(http)?;
        let status = response.status();

        // 4xx でも Bot API は JSON で理由を返すので、まず body を読む
        let body: ApiResponse<T> = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(DeliveryError::Status {
                    method,
                    status: status.as_u16(),
                });
            }
            Err(e) => return Err(http(e)),
        };

        if !body.ok {
            return Err(DeliveryError::Api {
                method,
                description: body
                    .description
                    .unwrap_or_else(|| format!("http status {status}")),
            });
        }
        body.result.ok_or(DeliveryError::MissingResult { method })
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_photo(
        &self,
        image: Vec<u8>,
        caption: Option<String>,
    ) -> Result<(), DeliveryError> {
        let mut form = Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .text("parse_mode", "HTML")
            .part("photo", Self::photo_part(image)?);
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            form = form.text("caption", caption);
        }

        debug!(chat_id = %self.config.chat_id, "sendPhoto");
        let request = self
            .client
            .post(self.config.method_url("sendPhoto"))
            .multipart(form)
            .timeout(self.config.photo_timeout);
        self.call::<serde_json::Value>("sendPhoto", request).await?;
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        let params = [
            ("chat_id", self.config.chat_id.as_str()),
            ("text", text),
            ("parse_mode", "HTML"),
        ];

        debug!(chat_id = %self.config.chat_id, chars = text.chars().count(), "sendMessage");
        let request = self
            .client
            .post(self.config.method_url("sendMessage"))
            .form(&params)
            .timeout(self.config.text_timeout);
        self.call::<serde_json::Value>("sendMessage", request).await?;
        Ok(())
    }

    async fn send_media_group(&self, mut parts: Vec<MediaPart>) -> Result<(), DeliveryError> {
        if parts.is_empty() {
            return Err(DeliveryError::EmptyBatch);
        }
        // Bot API は 1 枚だけの media group を受け付けない
        if parts.len() == 1
            && let Some(part) = parts.pop()
        {
            return self.send_photo(part.image, part.caption).await;
        }

        let count = parts.len();
        let mut media = Vec::with_capacity(count);
        let mut form = Form::new().text("chat_id", self.config.chat_id.clone());
        for (i, part) in parts.into_iter().enumerate() {
            let key = format!("photo{i}");
            media.push(InputMediaPhoto {
                kind: "photo",
                media: format!("attach://{key}"),
                caption: part.caption,
            });
            form = form.part(key, Self::photo_part(part.image)?);
        }
        form = form.text("media", serde_json::to_string(&media)?);

        debug!(chat_id = %self.config.chat_id, images = count, "sendMediaGroup");
        let request = self
            .client
            .post(self.config.method_url("sendMediaGroup"))
            .multipart(form)
            .timeout(self.config.batch_timeout);
        self.call::<serde_json::Value>("sendMediaGroup", request).await?;
        Ok(())
    }

    async fn check_connection(&self) -> Result<String, DeliveryError> {
        let request = self
            .client
            .get(self.config.method_url("getMe"))
            .timeout(self.config.connection_timeout);
        let bot: BotUser = self.call("getMe", request).await?;
        Ok(match bot.username {
            Some(username) => format!("{} (@{username})", bot.first_name),
            None => bot.first_name,
        })
    }
}

fn http(e: reqwest::Error) -> DeliveryError {
    DeliveryError::Http(e.without_url())
}
