//! App - アプリケーション層
//!
//! `store::FsQueue`（同期 API）を tokio のループに載せる。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: handler 登録と起動時検証
//! - **Processor**: consumer ループ（list → claim → dispatch → terminate）
//! - **Bridge**: request → response 待ち（同期 RPC 風）
//! - **SweeperLoop**: lease 期限切れの回収
//! - **GcLoop**: retention を過ぎたファイルの削除
//!
//! ファイル I/O は全て `spawn_blocking` 上で行い、reactor を止めない。

pub mod bridge;
pub mod builder;
pub mod config;
pub mod gc_loop;
pub mod processor;
pub mod sweeper_loop;

pub use self::bridge::Bridge;
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::config::{ConfigError, QueueConfig};
pub use self::gc_loop::GcLoop;
pub use self::processor::{Processor, TickReport};
pub use self::sweeper_loop::SweeperLoop;

use crate::domain::QueueError;
use crate::store::FsQueue;

/// `FsQueue` の同期呼び出しを blocking pool で実行する
pub(crate) async fn blocking<T, F>(queue: &FsQueue, f: F) -> Result<T, QueueError>
where
    T: Send + 'static,
    F: FnOnce(&FsQueue) -> Result<T, QueueError> + Send + 'static,
{
    let queue = queue.clone();
    tokio::task::spawn_blocking(move || f(&queue))
        .await
        .map_err(|e| QueueError::Blocking(e.to_string()))?
}
