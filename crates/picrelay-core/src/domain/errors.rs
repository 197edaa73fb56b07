//! Errors - エラー型と分類
//!
//! These never reach producers. The dispatch policy turns every
//! `DeliveryError` into a failed attempt and the retry policy treats all kinds
//! the same; [`ErrorKind`] exists for log lines.

use thiserror::Error;

/// ErrorKind は失敗の分類（ログ用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network trouble, timeouts, 5xx.
    Transient,
    /// The service answered `ok: false`.
    Rejected,
    /// The request could not be built at all.
    Invalid,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("{method} returned http status {status}")]
    Status { method: &'static str, status: u16 },

    #[error("{method} rejected: {description}")]
    Api {
        method: &'static str,
        description: String,
    },

    #[error("{method} reply had no result")]
    MissingResult { method: &'static str },

    #[error("could not encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("download of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("a batch needs at least one image")]
    EmptyBatch,
}

impl DeliveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeliveryError::Http(_) | DeliveryError::Fetch { .. } => ErrorKind::Transient,
            DeliveryError::Status { status, .. } if *status >= 500 || *status == 429 => {
                ErrorKind::Transient
            }
            DeliveryError::Status { .. }
            | DeliveryError::Api { .. }
            | DeliveryError::MissingResult { .. } => ErrorKind::Rejected,
            DeliveryError::Encode(_) | DeliveryError::EmptyBatch => ErrorKind::Invalid,
        }
    }
}
