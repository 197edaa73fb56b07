//! Ports - 抽象化レイヤー
//!
//! 外部システム（メッセージングサービス、画像ホスト）へのインターフェース。
//! The core only talks to these traits; `impls` holds the HTTP and in-memory
//! implementations.

pub mod image_fetcher;
pub mod transport;

pub use self::image_fetcher::ImageFetcher;
pub use self::transport::{MediaPart, Transport};
