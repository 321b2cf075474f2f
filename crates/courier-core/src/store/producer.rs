//! Producer: publish new items into `pending/`.

use tracing::{info, warn};

use super::FsQueue;
use super::fs::{Publish, write_atomic};
use crate::domain::{CorrelationId, ItemStatus, QueueError, QueueItem};
use crate::typed::Task;

/// Optional knobs for [`FsQueue::enqueue_with`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Advisory ordering hint, higher first.
    pub priority: Option<i32>,
    /// Text for the notification pointer; defaults to the kind.
    pub hint: Option<String>,
    /// Skip the notification pointer.
    pub silent: bool,
}

impl EnqueueOptions {
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

impl FsQueue {
    /// Publish a new item of `kind` and return its id.
    pub fn enqueue(
        &self,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<CorrelationId, QueueError> {
        self.enqueue_with(kind, payload, EnqueueOptions::default())
    }

    /// Publish a typed task under `T::KIND`.
    pub fn submit<T: Task>(&self, task: &T) -> Result<CorrelationId, QueueError> {
        let payload = serde_json::to_value(task).map_err(|e| QueueError::Encode(e.to_string()))?;
        self.enqueue(T::KIND, payload)
    }

    pub fn enqueue_with(
        &self,
        kind: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<CorrelationId, QueueError> {
        if kind.trim().is_empty() {
            return Err(QueueError::InvalidKind);
        }

        let id = self.new_id();
        let item = QueueItem::new(id.clone(), self.clock.now(), kind, payload)
            .with_priority(options.priority);
        let bytes = self.codec.encode_as(&item)?;

        let path = self.layout.item_path(ItemStatus::Pending, &id);
        // temp + rename。consumer から書きかけのファイルは見えない
        write_atomic(&path, &bytes, Publish::NoClobber)
            .map_err(|e| QueueError::io_at("publishing", &path, e))?;
        info!(id = %id, kind, "enqueued");

        if !options.silent {
            let hint = options.hint.unwrap_or_else(|| kind.to_string());
            if let Err(e) = self.notify(&id, &hint) {
                // 通知は best-effort。失敗しても enqueue は成功
                warn!(id = %id, error = %e, "failed to write notification pointer");
            }
        }

        Ok(id)
    }
}
