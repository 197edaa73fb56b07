use thiserror::Error;

use crate::app::BuildError;
use crate::config::ConfigError;
use crate::domain::DeliveryError;

/// Errors from setting up a coordinator. Nothing after startup returns one.
#[derive(Debug, Error)]
pub enum PicrelayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Build(#[from] BuildError),
}
