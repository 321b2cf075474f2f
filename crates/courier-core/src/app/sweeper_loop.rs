//! SweeperLoop - lease 期限切れの回収
//!
//! `sweep_interval` ごとに `FsQueue::sweep(lease)` を呼ぶだけ。

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::blocking;
use crate::domain::QueueError;
use crate::store::{FsQueue, SweepReport};

#[derive(Debug, Clone)]
pub struct SweeperLoop {
    queue: FsQueue,
    lease: Duration,
    interval: Duration,
}

impl SweeperLoop {
    pub fn new(queue: FsQueue, lease: Duration, interval: Duration) -> Self {
        Self {
            queue,
            lease,
            interval,
        }
    }

    pub async fn sweep_once(&self) -> Result<SweepReport, QueueError> {
        let lease = self.lease;
        blocking(&self.queue, move |queue| queue.sweep(lease)).await
    }

    pub async fn run(&self, token: CancellationToken) {
        info!(lease = ?self.lease, interval = ?self.interval, "sweeper started");
        loop {
            if let Err(e) = self.sweep_once().await {
                error!(error = %e, "sweep failed");
            }
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ItemStatus;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn expired_claims_return_to_pending() {
        let dir = TempDir::new().unwrap();
        let queue = FsQueue::open(dir.path()).unwrap();
        let id = queue.enqueue("k", json!({})).unwrap();
        queue.claim(&id).unwrap().unwrap();

        let sweeper = SweeperLoop::new(queue.clone(), Duration::from_millis(20), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let report = sweeper.sweep_once().await.unwrap();

        assert_eq!(report.reclaimed, 1);
        assert_eq!(queue.status_of(&id).unwrap(), Some(ItemStatus::Pending));
    }

    #[tokio::test]
    async fn run_exits_on_cancel() {
        let dir = TempDir::new().unwrap();
        let queue = FsQueue::open(dir.path()).unwrap();
        let sweeper = SweeperLoop::new(queue, Duration::from_secs(60), Duration::from_secs(3600));
        let token = CancellationToken::new();
        token.cancel();
        // interval が長くても即座に抜ける
        tokio::time::timeout(Duration::from_secs(5), sweeper.run(token))
            .await
            .unwrap();
    }
}
