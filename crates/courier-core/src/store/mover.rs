//! Claim / state-machine mover.
//!
//! Pure plumbing: no kinds, no handlers. Each transition is one `rename(2)`,
//! and losing a rename race is a normal result rather than an error.

use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use super::FsQueue;
use super::fs::{Publish, exists, read_if_exists, remove_if_exists, rename_if_exists, set_mtime, write_atomic};
use crate::domain::{CorrelationId, ItemStatus, Outcome, QueueError, QueueItem};

/// Result of [`FsQueue::terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The terminal record was written by this call.
    Recorded(ItemStatus),
    /// The item was already terminal; nothing changed.
    AlreadyTerminal(ItemStatus),
}

impl Termination {
    pub fn status(self) -> ItemStatus {
        match self {
            Termination::Recorded(s) | Termination::AlreadyTerminal(s) => s,
        }
    }
}

impl FsQueue {
    /// Try to take ownership of a pending item.
    ///
    /// `Ok(None)` means another consumer won the race (or the id is not
    /// pending). After a win the item is in `claimed/` even if decoding
    /// fails; the caller then decides between [`FsQueue::reject`] and leaving
    /// it for the sweeper.
    pub fn claim(&self, id: &CorrelationId) -> Result<Option<QueueItem>, QueueError> {
        let from = self.layout.item_path(ItemStatus::Pending, id);
        let to = self.layout.item_path(ItemStatus::Claimed, id);

        // lease の起点。rename は mtime を変えないので、先に pending 側で更新する。
        // 競争に負けた側が触っても同じ inode の時刻が新しくなるだけ
        match set_mtime(&from, self.clock.now()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(QueueError::io_at("stamping", &from, e)),
        }

        let won = rename_if_exists(&from, &to)
            .map_err(|e| QueueError::io_at("claiming", &from, e))?;
        if !won {
            debug!(id = %id, "claim lost");
            return Ok(None);
        }
        debug!(id = %id, "claimed");

        let bytes = std::fs::read(&to).map_err(|e| QueueError::io_at("reading", &to, e))?;
        let item: QueueItem = self.decode_at(&bytes, &to)?;
        if item.id != *id {
            return Err(QueueError::decode(
                Self::context(&to),
                format!("document id {} does not match file name", item.id),
            ));
        }
        Ok(Some(item))
    }

    /// Record the outcome of a claimed item.
    ///
    /// The claimed file is first renamed to its hidden staging name, which
    /// fails if the sweeper already took the item back (`NotClaimed`). The
    /// terminal record is then published without clobbering, and the
    /// staging file removed. A crash in between is healed by the sweeper.
    pub fn terminate(
        &self,
        id: &CorrelationId,
        outcome: Outcome,
    ) -> Result<Termination, QueueError> {
        let Some(staging) = self.acquire_staging(id)? else {
            return match self.terminal_status(id)? {
                Some(status) => Ok(Termination::AlreadyTerminal(status)),
                None => Err(QueueError::NotClaimed(id.clone())),
            };
        };

        let bytes = std::fs::read(&staging).map_err(|e| QueueError::io_at("reading", &staging, e))?;
        let item: QueueItem = match self.decode_at(&bytes, &staging) {
            Ok(item) => item,
            Err(e) => {
                self.release_staging(id, &staging);
                return Err(e);
            }
        };

        let status = outcome.status();
        let record = item.into_terminal(outcome, self.clock.now());
        self.finish(id, &staging, &record, status)
    }

    /// Fail a claimed item whose document cannot be decoded.
    ///
    /// The raw bytes are kept (lossy UTF-8) in the payload of the failed
    /// record so the poison message stays inspectable.
    pub fn reject(&self, id: &CorrelationId, reason: &str) -> Result<Termination, QueueError> {
        let Some(staging) = self.acquire_staging(id)? else {
            return match self.terminal_status(id)? {
                Some(status) => Ok(Termination::AlreadyTerminal(status)),
                None => Err(QueueError::NotClaimed(id.clone())),
            };
        };

        let raw = read_if_exists(&staging)
            .map_err(|e| QueueError::io_at("reading", &staging, e))?
            .unwrap_or_default();
        let now = self.clock.now();
        let record = QueueItem::new(
            id.clone(),
            now,
            String::new(),
            serde_json::Value::String(String::from_utf8_lossy(&raw).into_owned()),
        )
        .into_terminal(Outcome::Failure(format!("undecodable item: {reason}")), now);
        self.finish(id, &staging, &record, ItemStatus::Failed)
    }

    /// `claimed/<id>` -> `claimed/.<id>.finishing`.
    ///
    /// Also adopts a staging file left by an earlier interrupted call.
    fn acquire_staging(&self, id: &CorrelationId) -> Result<Option<std::path::PathBuf>, QueueError> {
        let claimed = self.layout.item_path(ItemStatus::Claimed, id);
        let staging = self.layout.staging_path(id);

        let moved = rename_if_exists(&claimed, &staging)
            .map_err(|e| QueueError::io_at("staging", &claimed, e))?;
        if moved {
            return Ok(Some(staging));
        }
        let leftover = exists(&staging).map_err(|e| QueueError::io_at("checking", &staging, e))?;
        Ok(leftover.then_some(staging))
    }

    fn release_staging(&self, id: &CorrelationId, staging: &Path) {
        let claimed = self.layout.item_path(ItemStatus::Claimed, id);
        if let Err(e) = std::fs::rename(staging, &claimed) {
            warn!(id = %id, error = %e, "failed to return staging file to claimed");
        }
    }

    fn finish(
        &self,
        id: &CorrelationId,
        staging: &Path,
        record: &QueueItem,
        status: ItemStatus,
    ) -> Result<Termination, QueueError> {
        // terminal は不変。どちらかに既にあれば何もしない
        if let Some(status) = self.terminal_status(id)? {
            self.drop_staging(id, staging);
            return Ok(Termination::AlreadyTerminal(status));
        }

        let bytes = match self.codec.encode_as(record) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.release_staging(id, staging);
                return Err(e);
            }
        };

        let target = self.layout.item_path(status, id);
        match write_atomic(&target, &bytes, Publish::NoClobber) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                self.drop_staging(id, staging);
                return Ok(Termination::AlreadyTerminal(status));
            }
            Err(e) => {
                self.release_staging(id, staging);
                return Err(QueueError::io_at("publishing", &target, e));
            }
        }

        self.drop_staging(id, staging);
        info!(id = %id, kind = %record.kind, status = ?status, "terminated");
        Ok(Termination::Recorded(status))
    }

    fn drop_staging(&self, id: &CorrelationId, staging: &Path) {
        // 失敗しても sweeper が片付ける
        if let Err(e) = remove_if_exists(staging) {
            warn!(id = %id, error = %e, "failed to remove staging file");
        }
    }
}
