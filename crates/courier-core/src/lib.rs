//! courier-core
//!
//! Directory-based task exchange: producers drop JSON documents into
//! `pending/`, consumers take them with an atomic `rename(2)`, and the outcome
//! lands in `completed/` or `failed/`. No broker, no database; the filesystem
//! is the only coordination point.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, item, artifact, errors）
//! - **ports**: 差し替え可能な抽象（Clock, IdGenerator, Codec）
//! - **store**: `FsQueue` - ディレクトリ上の状態遷移（同期 API）
//! - **typed**: 型付き Task API（Task, Handler, TypedRegistry）
//! - **app**: tokio 上のループ（Processor, Bridge, SweeperLoop, GcLoop）
//!
//! # 使用例
//! ```ignore
//! let app = AppBuilder::new(QueueConfig::new("/var/lib/courier"))
//!     .register::<PlanRequest, _>(Planner)?
//!     .build()?;
//!
//! let token = CancellationToken::new();
//! tokio::spawn({
//!     let app = app.clone();
//!     let token = token.clone();
//!     async move { app.run(token).await }
//! });
//!
//! let plan = app.bridge().request(&PlanRequest { .. }, timeout, &token).await?;
//! ```

pub mod app;
pub mod domain;
pub mod ports;
pub mod store;
pub mod typed;

pub use app::{App, AppBuilder, Bridge, Processor, QueueConfig};
pub use domain::{CorrelationId, ItemStatus, Outcome, QueueError, QueueItem, ResponseArtifact};
pub use store::FsQueue;
pub use typed::{Handler, HandlerError, Task};
