//! Reconciliation sweeper: return expired claims to `pending/`.
//!
//! The claim timestamp is the claimed file's mtime (set by `claim`). Every
//! move here is a single rename, so a sweeper racing a live consumer either
//! wins cleanly or finds the file gone and skips it.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::FsQueue;
use super::fs::{file_names, mtime, remove_if_exists, rename_if_exists};
use crate::domain::{CorrelationId, ItemStatus, QueueError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Claims moved back to `pending/`.
    pub reclaimed: usize,
    /// Leftovers removed because a terminal record already existed.
    pub cleaned: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.reclaimed == 0 && self.cleaned == 0
    }
}

impl FsQueue {
    /// Reclaim every claim older than `lease`.
    pub fn sweep(&self, lease: Duration) -> Result<SweepReport, QueueError> {
        let mut report = SweepReport::default();
        let Some(cutoff) = self.cutoff(lease) else {
            return Ok(report);
        };

        let dir = self.layout.dir(ItemStatus::Claimed);
        let names = file_names(&dir).map_err(|e| QueueError::io_at("listing", &dir, e))?;

        for name in names {
            if let Some(id) = self.layout.id_of(&name) {
                self.sweep_claim(&id, &dir.join(&name), cutoff, &mut report)?;
            } else if let Some(id) = self.layout.staging_id(&name) {
                self.sweep_staging(&id, &dir.join(&name), cutoff, &mut report)?;
            }
        }

        if !report.is_empty() {
            info!(reclaimed = report.reclaimed, cleaned = report.cleaned, "sweep finished");
        }
        Ok(report)
    }

    fn sweep_claim(
        &self,
        id: &CorrelationId,
        path: &Path,
        cutoff: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), QueueError> {
        if !self.is_stale(path, cutoff)? {
            return Ok(());
        }

        // terminal を書いた直後に落ちた場合。claimed 側はただの残骸
        if self.terminal_status(id)?.is_some() {
            if remove_if_exists(path).map_err(|e| QueueError::io_at("removing", path, e))? {
                debug!(id = %id, "removed stale claim of a terminal item");
                report.cleaned += 1;
            }
            return Ok(());
        }

        let pending = self.layout.item_path(ItemStatus::Pending, id);
        if rename_if_exists(path, &pending).map_err(|e| QueueError::io_at("reclaiming", path, e))? {
            warn!(id = %id, "lease expired, item returned to pending");
            report.reclaimed += 1;
        }
        Ok(())
    }

    fn sweep_staging(
        &self,
        id: &CorrelationId,
        path: &Path,
        cutoff: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), QueueError> {
        if self.terminal_status(id)?.is_some() {
            if remove_if_exists(path).map_err(|e| QueueError::io_at("removing", path, e))? {
                debug!(id = %id, "removed leftover staging file");
                report.cleaned += 1;
            }
            return Ok(());
        }

        if !self.is_stale(path, cutoff)? {
            return Ok(());
        }
        let pending = self.layout.item_path(ItemStatus::Pending, id);
        if rename_if_exists(path, &pending).map_err(|e| QueueError::io_at("reclaiming", path, e))? {
            warn!(id = %id, "interrupted termination, item returned to pending");
            report.reclaimed += 1;
        }
        Ok(())
    }

    /// Missing files are never stale: someone else already moved them.
    fn is_stale(&self, path: &Path, cutoff: DateTime<Utc>) -> Result<bool, QueueError> {
        match mtime(path) {
            Ok(at) => Ok(at < cutoff),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(QueueError::io_at("stat", path, e)),
        }
    }
}
