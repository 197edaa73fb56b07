//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **TelegramTransport**: 本番用（Bot API over reqwest）
//! - **HttpImageFetcher**: 本番用の画像ダウンロード
//! - **RecordingTransport / StaticFetcher**: テスト・開発用（ネットワークなし）

pub mod http_fetcher;
pub mod recording;
pub mod telegram;

pub use self::http_fetcher::HttpImageFetcher;
pub use self::recording::{RecordedCall, RecordingTransport, StaticFetcher, TransportCall};
pub use self::telegram::TelegramTransport;
