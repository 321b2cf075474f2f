//! Bridge - request / response を 1 回の await にまとめる
//!
//! # フロー
//! 1. enqueue（id を得る）
//! 2. `responses/<id>` を `poll_interval` ごとに見る
//! 3. 現れたら読んで消す。deadline か cancel で諦める
//!
//! 諦めても request は取り消さない。結果は後から `FsQueue::outcome` で拾える。

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::blocking;
use super::config::QueueConfig;
use crate::domain::{CorrelationId, QueueError};
use crate::store::FsQueue;
use crate::typed::Task;

#[derive(Debug, Clone)]
pub struct Bridge {
    queue: FsQueue,
    poll_interval: Duration,
    default_timeout: Duration,
}

impl Bridge {
    pub fn new(queue: FsQueue, config: &QueueConfig) -> Self {
        Self {
            queue,
            poll_interval: config.poll_interval,
            default_timeout: config.response_timeout,
        }
    }

    pub fn queue(&self) -> &FsQueue {
        &self.queue
    }

    /// `QueueConfig::response_timeout`
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// enqueue して response を待つ
    pub async fn request_and_wait(
        &self,
        kind: &str,
        payload: Value,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<Value, QueueError> {
        let kind = kind.to_string();
        let id = blocking(&self.queue, move |queue| queue.enqueue(&kind, payload)).await?;
        self.wait(&id, timeout, token).await
    }

    /// 型付き版。payload と response の型は `T` が決める
    pub async fn request<T: Task>(
        &self,
        task: &T,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<T::Response, QueueError> {
        let payload = serde_json::to_value(task).map_err(|e| QueueError::Encode(e.to_string()))?;
        let value = self.request_and_wait(T::KIND, payload, timeout, token).await?;
        serde_json::from_value(value).map_err(|e| QueueError::decode(format!("response to {}", T::KIND), e))
    }

    /// 既に enqueue 済みの `id` の response を待つ
    pub async fn wait(
        &self,
        id: &CorrelationId,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<Value, QueueError> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            let take_id = id.clone();
            let taken = blocking(&self.queue, move |queue| queue.take_response(&take_id)).await?;
            if let Some(artifact) = taken {
                debug!(id = %id, waited = ?started.elapsed(), "response received");
                return artifact.into_result();
            }

            let now = Instant::now();
            if now >= deadline {
                info!(id = %id, ?timeout, "gave up waiting for response");
                return Err(QueueError::Timeout {
                    id: id.clone(),
                    waited: timeout,
                });
            }
            let nap = self.poll_interval.min(deadline - now);
            tokio::select! {
                _ = token.cancelled() => {
                    return Err(QueueError::Cancelled { id: id.clone() });
                }
                _ = tokio::time::sleep(nap) => {}
            }
        }
    }

    /// consumer 側: response を書く
    pub async fn respond(&self, id: &CorrelationId, payload: Value) -> Result<bool, QueueError> {
        let id = id.clone();
        blocking(&self.queue, move |queue| queue.respond(&id, payload)).await
    }

    pub async fn respond_error(&self, id: &CorrelationId, message: &str) -> Result<bool, QueueError> {
        let id = id.clone();
        let message = message.to_string();
        blocking(&self.queue, move |queue| queue.respond_error(&id, &message)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ItemStatus;
    use serde_json::json;
    use tempfile::TempDir;

    fn bridge() -> (Bridge, TempDir) {
        let dir = TempDir::new().unwrap();
        let queue = FsQueue::open(dir.path().join("q")).unwrap();
        let config = QueueConfig::new(queue.root()).with_poll_interval(Duration::from_millis(10));
        (Bridge::new(queue, &config), dir)
    }

    #[tokio::test]
    async fn response_written_by_a_consumer_is_returned() {
        let (bridge, _dir) = bridge();
        let consumer = bridge.clone();
        let worker = tokio::spawn(async move {
            // pending に現れるまで待ってから答える
            loop {
                let ids = consumer.queue().list_pending().unwrap();
                if let Some(id) = ids.first() {
                    consumer.queue().claim(id).unwrap().unwrap();
                    consumer.respond(id, json!({"result": "ok"})).await.unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let token = CancellationToken::new();
        let value = bridge
            .request_and_wait("plan-request", json!({"task": "demo"}), Duration::from_secs(5), &token)
            .await
            .unwrap();
        worker.await.unwrap();

        assert_eq!(value, json!({"result": "ok"}));
        assert_eq!(bridge.queue().counts().unwrap().responses, 0);
    }

    #[tokio::test]
    async fn timeout_leaves_the_request_pending() {
        let (bridge, _dir) = bridge();
        let token = CancellationToken::new();

        let started = std::time::Instant::now();
        let err = bridge
            .request_and_wait("plan-request", json!({}), Duration::from_millis(100), &token)
            .await
            .unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(100));

        let (id, waited) = match err {
            QueueError::Timeout { id, waited } => (id, waited),
            other => panic!("expected timeout, got {other:?}"),
        };
        assert_eq!(waited, Duration::from_millis(100));
        assert_eq!(bridge.queue().status_of(&id).unwrap(), Some(ItemStatus::Pending));
    }

    #[tokio::test]
    async fn cancellation_stops_the_wait() {
        let (bridge, _dir) = bridge();
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let err = bridge
            .request_and_wait("plan-request", json!({}), Duration::from_secs(30), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn error_response_is_a_remote_error() {
        let (bridge, _dir) = bridge();
        let id = CorrelationId::new("req-1").unwrap();
        bridge.respond_error(&id, "no plan").await.unwrap();

        let err = bridge
            .wait(&id, Duration::from_secs(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Remote { ref message, .. } if message == "no plan"));
    }

    #[tokio::test]
    async fn malformed_response_is_deleted_and_reported() {
        let (bridge, _dir) = bridge();
        let id = CorrelationId::new("req-1").unwrap();
        std::fs::write(bridge.queue().layout().response_path(&id), b"{oops").unwrap();

        let err = bridge
            .wait(&id, Duration::from_secs(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Decode { .. }));
        assert!(!bridge.queue().layout().response_path(&id).exists());
    }
}
