//! picrelay-core
//!
//! Best-effort, non-blocking image delivery to one chat.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ItemId, DeliveryItem, Caption, errors）
//! - **ports**: 抽象化レイヤー（Transport, ImageFetcher）
//! - **impls**: 実装（TelegramTransport, HttpImageFetcher, テスト用 RecordingTransport）
//! - **queue**: FIFO キューとリトライポリシー
//! - **app**: DispatchPolicy, WorkerLoop, DeliveryCoordinator
//! - **config**: Telegram 接続設定
//! - **observability**: tracing の初期化

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;

pub use app::{CoordinatorBuilder, DeliveryCoordinator, QueueStatus, ShutdownReport};
pub use config::{ConfigOverrides, TelegramConfig};
pub use domain::{DeliveryItem, ImageRef, ItemId};
pub use error::PicrelayError;
