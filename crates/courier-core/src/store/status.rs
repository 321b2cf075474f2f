//! Status queries, derived from directory contents on every call.

use serde::{Deserialize, Serialize};

use super::FsQueue;
use super::fs::{exists, file_names, read_if_exists};
use crate::domain::{CorrelationId, ItemStatus, QueueError, QueueItem};

/// Number of items per directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    pub responses: usize,
}

impl FsQueue {
    /// Ids currently in `status`, sorted.
    pub fn list(&self, status: ItemStatus) -> Result<Vec<CorrelationId>, QueueError> {
        let dir = self.layout.dir(status);
        let names = file_names(&dir).map_err(|e| QueueError::io_at("listing", &dir, e))?;
        Ok(names.iter().filter_map(|n| self.layout.id_of(n)).collect())
    }

    pub fn list_pending(&self) -> Result<Vec<CorrelationId>, QueueError> {
        self.list(ItemStatus::Pending)
    }

    pub fn counts(&self) -> Result<QueueCounts, QueueError> {
        let responses_dir = self.layout.responses_dir();
        let responses = file_names(&responses_dir)
            .map_err(|e| QueueError::io_at("listing", &responses_dir, e))?
            .iter()
            .filter(|n| self.layout.id_of(n).is_some())
            .count();

        Ok(QueueCounts {
            pending: self.list(ItemStatus::Pending)?.len(),
            claimed: self.list(ItemStatus::Claimed)?.len(),
            completed: self.list(ItemStatus::Completed)?.len(),
            failed: self.list(ItemStatus::Failed)?.len(),
            responses,
        })
    }

    /// Which directory holds `id`, if any.
    ///
    /// Terminal directories are checked first: during the short window in
    /// which a claimed copy and a terminal record coexist, the terminal one is
    /// the truth. A staging file counts as claimed.
    pub fn status_of(&self, id: &CorrelationId) -> Result<Option<ItemStatus>, QueueError> {
        if let Some(status) = self.terminal_status(id)? {
            return Ok(Some(status));
        }
        for status in [ItemStatus::Claimed, ItemStatus::Pending] {
            if self.present(&self.layout.item_path(status, id))? {
                return Ok(Some(status));
            }
        }
        if self.present(&self.layout.staging_path(id))? {
            return Ok(Some(ItemStatus::Claimed));
        }
        Ok(None)
    }

    pub(crate) fn terminal_status(&self, id: &CorrelationId) -> Result<Option<ItemStatus>, QueueError> {
        for status in [ItemStatus::Completed, ItemStatus::Failed] {
            if self.present(&self.layout.item_path(status, id))? {
                return Ok(Some(status));
            }
        }
        Ok(None)
    }

    /// The terminal record of `id`, for late pickup after a bridge timeout.
    pub fn outcome(&self, id: &CorrelationId) -> Result<Option<(ItemStatus, QueueItem)>, QueueError> {
        for status in [ItemStatus::Completed, ItemStatus::Failed] {
            if let Some(item) = self.load(status, id)? {
                return Ok(Some((status, item)));
            }
        }
        Ok(None)
    }

    /// Read a pending item without claiming it.
    pub fn peek(&self, id: &CorrelationId) -> Result<Option<QueueItem>, QueueError> {
        self.load(ItemStatus::Pending, id)
    }

    pub fn load(&self, status: ItemStatus, id: &CorrelationId) -> Result<Option<QueueItem>, QueueError> {
        let path = self.layout.item_path(status, id);
        let Some(bytes) = read_if_exists(&path).map_err(|e| QueueError::io_at("reading", &path, e))? else {
            return Ok(None);
        };
        self.decode_at(&bytes, &path).map(Some)
    }

    fn present(&self, path: &std::path::Path) -> Result<bool, QueueError> {
        exists(path).map_err(|e| QueueError::io_at("checking", path, e))
    }
}
