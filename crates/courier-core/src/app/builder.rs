//! AppBuilder - handler 登録と起動時検証
//!
//! # Fail-fast 設計
//! - `expect_kinds()` で期待される kind を宣言
//! - `build()` 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - queue ディレクトリもここで作る

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::bridge::Bridge;
use super::config::{ConfigError, QueueConfig};
use super::gc_loop::GcLoop;
use super::processor::Processor;
use super::sweeper_loop::SweeperLoop;
use crate::domain::QueueError;
use crate::store::FsQueue;
use crate::typed::{Handler, RegistryError, Task, TypedRegistry};

/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(QueueConfig::new("/var/lib/courier"))
///     .register::<PlanRequest, _>(Planner)?
///     .expect_kinds(&["plan-request"])
///     .build()?;
/// ```
pub struct AppBuilder {
    config: QueueConfig,
    queue: Option<FsQueue>,
    registry: TypedRegistry,
    expected_kinds: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing handlers for kinds: {0:?}")]
    MissingKinds(Vec<String>),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl AppBuilder {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            queue: None,
            registry: TypedRegistry::new(),
            expected_kinds: None,
        }
    }

    /// `config.root` から作る代わりに、組み立て済みの queue を使う
    /// （clock や id 生成器を差し替えたいとき）。`config.root` は queue の root で上書きされる
    pub fn with_queue(mut self, queue: FsQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn expect_kinds(mut self, kinds: &[&str]) -> Self {
        self.expected_kinds = Some(kinds.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected) = &self.expected_kinds {
            let missing: Vec<String> = expected
                .iter()
                .filter(|k| !self.registry.contains(k))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingKinds(missing));
            }
        }
        let mut config = self.config;
        config.validate()?;

        let queue = match self.queue {
            Some(queue) => {
                let queue = queue.init()?;
                // App::config() が別のディレクトリを指さないように揃える
                config.root = queue.root().to_path_buf();
                queue
            }
            None => FsQueue::open(config.root())?,
        };
        info!(
            root = %queue.root().display(),
            kinds = ?self.registry.registered_kinds(),
            "app built"
        );

        Ok(App {
            queue,
            registry: Arc::new(self.registry),
            config,
        })
    }
}

/// 構築済みのアプリケーション。各ループの factory
#[derive(Debug, Clone)]
pub struct App {
    queue: FsQueue,
    registry: Arc<TypedRegistry>,
    config: QueueConfig,
}

impl App {
    pub fn queue(&self) -> &FsQueue {
        &self.queue
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn processor(&self) -> Processor {
        Processor::new(self.queue.clone(), Arc::clone(&self.registry), self.config.clone())
    }

    pub fn bridge(&self) -> Bridge {
        Bridge::new(self.queue.clone(), &self.config)
    }

    pub fn sweeper(&self) -> SweeperLoop {
        SweeperLoop::new(self.queue.clone(), self.config.lease, self.config.sweep_interval)
    }

    pub fn gc(&self) -> GcLoop {
        GcLoop::new(self.queue.clone(), self.config.retention, self.config.gc_interval)
    }

    /// processor / sweeper / gc を token が cancel されるまで並行に回す
    pub async fn run(&self, token: CancellationToken) {
        let processor = self.processor();
        let sweeper = self.sweeper();
        let gc = self.gc();
        tokio::join!(
            processor.run(token.clone()),
            sweeper.run(token.clone()),
            gc.run(token),
        );
    }
}
