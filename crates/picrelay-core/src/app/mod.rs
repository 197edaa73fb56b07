//! App - アプリケーション層
//!
//! ports を組み合わせて配送パイプラインを実装します。
//!
//! # 主要コンポーネント
//! - **DispatchPolicy**: 1 件を single / batch としてどう送るか（caption 分割含む）
//! - **WorkerLoop**: primary / retry キューを消費するループ
//! - **DeliveryCoordinator**: producer 向け API、状態取得、shutdown
//! - **CoordinatorBuilder**: 構築とワイヤリング

pub mod builder;
pub mod coordinator;
pub mod dispatch;
pub mod status;
pub mod worker_loop;

pub use self::builder::{BuildError, CoordinatorBuilder};
pub use self::coordinator::DeliveryCoordinator;
pub use self::dispatch::DispatchPolicy;
pub use self::status::{QueueStatus, ShutdownReport};
pub use self::worker_loop::{Stage, WorkerLoop};
