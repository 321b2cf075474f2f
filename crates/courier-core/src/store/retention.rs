//! Retention purge for terminal records and side artifacts.
//!
//! Items in `pending/` and `claimed/` are never touched: live work is not
//! subject to retention. Only abandoned `.*.tmp` files from crashed writers are
//! removed there. Staging files (`.*.finishing`) belong to the sweeper.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::FsQueue;
use super::fs::{file_names, mtime, remove_if_exists};
use crate::domain::{ItemStatus, QueueError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    /// Records removed from `completed/` and `failed/`.
    pub terminal: usize,
    /// Unread responses.
    pub responses: usize,
    /// Notification pointers nobody drained.
    pub pointers: usize,
    /// Abandoned temp files (`.*.tmp`, `.*.taken`) from crashed writers.
    pub temp_files: usize,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.terminal + self.responses + self.pointers + self.temp_files
    }
}

enum Bucket {
    Terminal,
    Responses,
    Pointers,
    /// `pending/`, `claimed/`: temp files only
    Live,
}

impl FsQueue {
    /// Delete everything in the retained directories older than `retention`.
    pub fn purge(&self, retention: Duration) -> Result<PurgeReport, QueueError> {
        let mut report = PurgeReport::default();
        let Some(cutoff) = self.cutoff(retention) else {
            return Ok(report);
        };

        let dirs = [
            (self.layout.dir(ItemStatus::Completed), Bucket::Terminal),
            (self.layout.dir(ItemStatus::Failed), Bucket::Terminal),
            (self.layout.responses_dir(), Bucket::Responses),
            (self.layout.notify_dir(), Bucket::Pointers),
            (self.layout.dir(ItemStatus::Pending), Bucket::Live),
            (self.layout.dir(ItemStatus::Claimed), Bucket::Live),
        ];
        for (dir, bucket) in dirs {
            self.purge_dir(&dir, &bucket, cutoff, &mut report)?;
        }

        if report.total() > 0 {
            info!(
                terminal = report.terminal,
                responses = report.responses,
                pointers = report.pointers,
                temp_files = report.temp_files,
                "purged expired files"
            );
        }
        Ok(report)
    }

    fn purge_dir(
        &self,
        dir: &Path,
        bucket: &Bucket,
        cutoff: DateTime<Utc>,
        report: &mut PurgeReport,
    ) -> Result<(), QueueError> {
        let names = file_names(dir).map_err(|e| QueueError::io_at("listing", dir, e))?;
        for name in names {
            let is_item = self.layout.id_of(&name).is_some() && !matches!(bucket, Bucket::Live);
            let is_temp = name.starts_with('.')
                && match bucket {
                    Bucket::Live => name.ends_with(".tmp"),
                    _ => name.ends_with(".tmp") || name.ends_with(".taken"),
                };
            if !is_item && !is_temp {
                continue;
            }

            let path = dir.join(&name);
            let modified = match mtime(&path) {
                Ok(at) => at,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(QueueError::io_at("stat", &path, e)),
            };
            if modified >= cutoff {
                continue;
            }

            match remove_if_exists(&path) {
                Ok(false) => {}
                Ok(true) => match (is_temp, bucket) {
                    (true, _) => report.temp_files += 1,
                    (false, Bucket::Terminal) => report.terminal += 1,
                    (false, Bucket::Responses) => report.responses += 1,
                    (false, Bucket::Pointers) => report.pointers += 1,
                    (false, Bucket::Live) => {}
                },
                // 1 件消せなくても残りは続ける。次回の purge で再挑戦
                Err(e) => warn!(path = %path.display(), error = %e, "failed to purge file"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fs::set_mtime;
    use super::super::testing::test_queue;
    use crate::ports::Clock;
    use super::*;
    use crate::domain::{CorrelationId, Outcome};
    use serde_json::json;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    #[test]
    fn old_terminal_records_and_responses_are_purged() {
        let t = test_queue();
        let id = t.queue.enqueue("k", json!({})).unwrap();
        t.queue.claim(&id).unwrap().unwrap();
        t.queue.terminate(&id, Outcome::Success(json!(1))).unwrap();
        t.queue.respond(&id, json!(1)).unwrap();
        for path in [
            t.queue.layout().item_path(ItemStatus::Completed, &id),
            t.queue.layout().response_path(&id),
            t.queue.layout().notify_path(&id),
        ] {
            set_mtime(&path, t.clock.now()).unwrap();
        }

        t.clock.advance(DAY * 8);
        let report = t.queue.purge(DAY * 7).unwrap();
        assert_eq!(
            report,
            PurgeReport {
                terminal: 1,
                responses: 1,
                pointers: 1,
                temp_files: 0,
            }
        );
        assert_eq!(t.queue.status_of(&id).unwrap(), None);
    }

    #[test]
    fn recent_files_survive() {
        let t = test_queue();
        let id = t.queue.enqueue("k", json!({})).unwrap();
        t.queue.claim(&id).unwrap().unwrap();
        t.queue.terminate(&id, Outcome::failure("x")).unwrap();
        set_mtime(&t.queue.layout().item_path(ItemStatus::Failed, &id), t.clock.now()).unwrap();

        t.clock.advance(DAY);
        assert_eq!(t.queue.purge(DAY * 7).unwrap().terminal, 0);
        assert_eq!(t.queue.status_of(&id).unwrap(), Some(ItemStatus::Failed));
    }

    #[test]
    fn pending_and_claimed_are_never_purged() {
        let t = test_queue();
        let a = t.queue.enqueue("k", json!({})).unwrap();
        let b = t.queue.enqueue("k", json!({})).unwrap();
        t.queue.claim(&b).unwrap().unwrap();
        set_mtime(&t.queue.layout().item_path(ItemStatus::Pending, &a), t.clock.now()).unwrap();

        t.clock.advance(DAY * 365);
        t.queue.purge(DAY).unwrap();
        assert_eq!(t.queue.status_of(&a).unwrap(), Some(ItemStatus::Pending));
        assert_eq!(t.queue.status_of(&b).unwrap(), Some(ItemStatus::Claimed));
    }

    #[test]
    fn abandoned_temp_files_are_purged() {
        let t = test_queue();
        let dir = t.queue.layout().responses_dir();
        let tmp = dir.join(".abandoned.tmp");
        let taken = t.queue.layout().taken_response_path(&CorrelationId::new("x-1").unwrap());
        for path in [&tmp, &taken] {
            std::fs::write(path, b"{").unwrap();
            set_mtime(path, t.clock.now()).unwrap();
        }

        t.clock.advance(DAY * 2);
        let report = t.queue.purge(DAY).unwrap();
        assert_eq!(report.temp_files, 2);
        assert!(!tmp.exists());
        assert!(!taken.exists());
    }

    #[test]
    fn abandoned_temp_files_in_live_dirs_are_purged_but_items_stay() {
        let t = test_queue();
        let a = t.queue.enqueue("k", json!({})).unwrap();
        let b = t.queue.enqueue("k", json!({})).unwrap();
        t.queue.claim(&b).unwrap().unwrap();

        let pending_tmp = t.queue.layout().dir(ItemStatus::Pending).join(".crashed.tmp");
        let claimed_tmp = t.queue.layout().dir(ItemStatus::Claimed).join(".crashed.tmp");
        let staging = t.queue.layout().staging_path(&CorrelationId::new("x-1").unwrap());
        for path in [&pending_tmp, &claimed_tmp, &staging] {
            std::fs::write(path, b"{").unwrap();
        }
        for path in [
            pending_tmp.clone(),
            claimed_tmp.clone(),
            staging.clone(),
            t.queue.layout().item_path(ItemStatus::Pending, &a),
            t.queue.layout().item_path(ItemStatus::Claimed, &b),
        ] {
            set_mtime(&path, t.clock.now()).unwrap();
        }

        t.clock.advance(DAY * 2);
        let report = t.queue.purge(DAY).unwrap();
        assert_eq!(report.temp_files, 2);
        assert!(!pending_tmp.exists());
        assert!(!claimed_tmp.exists());
        // staging は sweeper の担当
        assert!(staging.exists());
        assert_eq!(t.queue.status_of(&a).unwrap(), Some(ItemStatus::Pending));
        assert_eq!(t.queue.status_of(&b).unwrap(), Some(ItemStatus::Claimed));
    }
}
