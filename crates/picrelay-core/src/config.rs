//! Configuration for the Telegram transport.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("environment variable {name} has an invalid value: {value:?}")]
    InvalidVar { name: &'static str, value: String },
}

/// Values that win over the environment (e.g. CLI flags).
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base_url: Option<String>,
}

impl ConfigOverrides {
    fn get(&self, name: &str) -> Option<String> {
        match name {
            "TELEGRAM_BOT_TOKEN" => self.bot_token.clone(),
            "TELEGRAM_CHAT_ID" => self.chat_id.clone(),
            "TELEGRAM_API_URL" => self.api_base_url.clone(),
            _ => None,
        }
    }
}

/// Where and how to talk to the Bot API.
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,

    /// Target chat: numeric id (`-100…`) or `@channelname`.
    pub chat_id: String,

    pub api_base_url: String,

    /// Image downloads.
    pub download_timeout: Duration,
    pub text_timeout: Duration,
    pub photo_timeout: Duration,
    pub batch_timeout: Duration,
    pub connection_timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            download_timeout: Duration::from_secs(30),
            text_timeout: Duration::from_secs(30),
            photo_timeout: Duration::from_secs(60),
            batch_timeout: Duration::from_secs(120),
            connection_timeout: Duration::from_secs(10),
        }
    }

    /// Read `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID` and optionally
    /// `TELEGRAM_API_URL` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(ConfigOverrides::default())
    }

    /// Like [`from_env`](Self::from_env), but each value set in `overrides`
    /// replaces the matching variable.
    pub fn from_env_with(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::from_lookup(layered(overrides, |name| std::env::var(name).ok()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            let value = lookup(name).ok_or(ConfigError::MissingVar(name))?;
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::InvalidVar { name, value });
            }
            Ok(trimmed.to_string())
        };

        let mut config = Self::new(
            required("TELEGRAM_BOT_TOKEN")?,
            required("TELEGRAM_CHAT_ID")?,
        );
        if let Some(url) = lookup("TELEGRAM_API_URL")
            && !url.trim().is_empty()
        {
            config = config.with_api_base_url(url);
        }
        Ok(config)
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// `{base}/bot{token}/{method}`. Contains the token: never log it.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base_url, self.bot_token, method)
    }
}

fn layered(
    overrides: ConfigOverrides,
    fallback: impl Fn(&str) -> Option<String>,
) -> impl Fn(&str) -> Option<String> {
    move |name: &str| overrides.get(name).or_else(|| fallback(name))
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base_url", &self.api_base_url)
            .field("download_timeout", &self.download_timeout)
            .field("text_timeout", &self.text_timeout)
            .field("photo_timeout", &self.photo_timeout)
            .field("batch_timeout", &self.batch_timeout)
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}
