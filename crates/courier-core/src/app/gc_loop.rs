//! GcLoop - retention を過ぎたファイルの削除
//!
//! completed / failed / responses / notify のうち `retention` より古いものを
//! `gc_interval` ごとに消す。pending と claimed には触らない。

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::blocking;
use crate::domain::QueueError;
use crate::store::{FsQueue, PurgeReport};

#[derive(Debug, Clone)]
pub struct GcLoop {
    queue: FsQueue,
    retention: Duration,
    interval: Duration,
}

impl GcLoop {
    pub fn new(queue: FsQueue, retention: Duration, interval: Duration) -> Self {
        Self {
            queue,
            retention,
            interval,
        }
    }

    pub async fn purge_once(&self) -> Result<PurgeReport, QueueError> {
        let retention = self.retention;
        blocking(&self.queue, move |queue| queue.purge(retention)).await
    }

    pub async fn run(&self, token: CancellationToken) {
        info!(retention = ?self.retention, interval = ?self.interval, "gc started");
        loop {
            if let Err(e) = self.purge_once().await {
                error!(error = %e, "purge failed");
            }
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("gc stopped");
    }
}
