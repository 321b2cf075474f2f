//! Processor - consumer ループ
//!
//! # フロー
//! 1. pending/ を列挙して順序を決める
//! 2. claim（負けたら次へ）
//! 3. kind で handler を引いて実行 → Outcome
//! 4. terminate、必要なら response も書く
//!
//! handler の失敗（未登録 kind / payload decode / Err / panic）は全て
//! `failed/` の record になり、ループは止まらない。item 単位の I/O エラーも
//! ログに残して次の item へ進む。notify/ の pointer は外部 watcher 向けなので
//! 触らない（古いものは retention が消す）。

use std::any::Any;
use std::cmp::Reverse;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::blocking;
use super::config::QueueConfig;
use crate::domain::{CorrelationId, ItemStatus, Outcome, QueueError, QueueItem};
use crate::store::{FsQueue, Termination};
use crate::typed::TypedRegistry;

/// `run_once` 1 回分の集計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// claim に勝った数
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    /// decode できず poison として failed/ に送った数
    pub rejected: usize,
    /// terminate 前に lease を失った数
    pub lost: usize,
    /// I/O などで処理できず pending に残した数
    pub errors: usize,
}

pub struct Processor {
    queue: FsQueue,
    registry: Arc<TypedRegistry>,
    config: QueueConfig,
}

impl Processor {
    pub fn new(queue: FsQueue, registry: Arc<TypedRegistry>, config: QueueConfig) -> Self {
        Self {
            queue,
            registry,
            config,
        }
    }

    /// 今ある pending を 1 周処理する
    pub async fn run_once(&self) -> Result<TickReport, QueueError> {
        let mut report = TickReport::default();
        for id in self.candidates().await? {
            // 1 件の失敗で tick 全体を止めると、同じ item が毎回先頭に来て後続が飢える
            if let Err(e) = self.process(id.clone(), &mut report).await {
                error!(id = %id, error = %e, "failed to process item, skipping");
                report.errors += 1;
            }
        }
        if report.claimed > 0 || report.errors > 0 {
            debug!(?report, "tick finished");
        }
        Ok(report)
    }

    /// cancel されるまで `poll_interval` ごとに `run_once` を回す。
    ///
    /// 処理中の item は最後まで処理してから抜ける。
    pub async fn run(&self, token: CancellationToken) {
        info!(
            root = %self.queue.root().display(),
            kinds = ?self.registry.registered_kinds(),
            "processor started"
        );
        loop {
            if token.is_cancelled() {
                break;
            }
            match self.run_once().await {
                // 何か処理できたなら待たずに次を見る
                Ok(report) if report.claimed > 0 => continue,
                Ok(_) => {}
                Err(e) => error!(error = %e, "processor tick failed"),
            }
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        info!("processor stopped");
    }

    async fn candidates(&self) -> Result<Vec<CorrelationId>, QueueError> {
        let honor_priority = self.config.honor_priority;
        blocking(&self.queue, move |queue| {
            let ids = queue.list_pending()?;
            if !honor_priority {
                return Ok(ids);
            }
            // priority は advisory。読めないものは 0 扱い、消えたものは外す
            let mut ranked = Vec::with_capacity(ids.len());
            for id in ids {
                match queue.peek(&id) {
                    Ok(Some(item)) => ranked.push((item.priority.unwrap_or(0), id)),
                    Ok(None) => {}
                    Err(_) => ranked.push((0, id)),
                }
            }
            ranked.sort_by_key(|(priority, id)| (Reverse(*priority), id.clone()));
            Ok(ranked.into_iter().map(|(_, id)| id).collect())
        })
        .await
    }

    async fn process(&self, id: CorrelationId, report: &mut TickReport) -> Result<(), QueueError> {
        let claim_id = id.clone();
        let claimed = blocking(&self.queue, move |queue| match queue.claim(&claim_id) {
            Ok(item) => Ok(Ok(item)),
            Err(e @ QueueError::Decode { .. }) => Ok(Err(e)),
            Err(e) => Err(e),
        })
        .await?;

        let item = match claimed {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(()),
            Err(decode) => {
                report.claimed += 1;
                return self.reject(id, decode, report).await;
            }
        };
        report.claimed += 1;
        debug!(id = %id, kind = %item.kind, "dispatching");

        let outcome = self.dispatch(item).await;
        self.finish(id, outcome, report).await
    }

    async fn dispatch(&self, item: QueueItem) -> Outcome {
        let Some(handler) = self.registry.get(&item.kind) else {
            return Outcome::failure(format!("no handler registered for kind {}", item.kind));
        };

        // 別 task で動かして panic を JoinError として受け取る
        let joined = tokio::spawn(async move { handler.handle_dyn(item.payload).await }).await;
        match joined {
            Ok(Ok(value)) => Outcome::Success(value),
            Ok(Err(e)) => Outcome::failure(e.to_string()),
            Err(e) if e.is_panic() => {
                Outcome::failure(format!("handler panicked: {}", panic_message(e.into_panic())))
            }
            Err(e) => Outcome::failure(format!("handler aborted: {e}")),
        }
    }

    async fn finish(
        &self,
        id: CorrelationId,
        outcome: Outcome,
        report: &mut TickReport,
    ) -> Result<(), QueueError> {
        let publish = self.config.publish_responses;
        let terminate_id = id.clone();
        let result = blocking(&self.queue, move |queue| {
            let termination = match queue.terminate(&terminate_id, outcome.clone()) {
                Ok(termination) => termination,
                Err(QueueError::NotClaimed(_)) => return Ok(None),
                Err(e) => return Err(e),
            };
            if publish && matches!(termination, Termination::Recorded(_)) {
                publish_response(queue, &terminate_id, &outcome);
            }
            Ok(Some(termination))
        })
        .await?;

        match result {
            Some(Termination::Recorded(ItemStatus::Completed)) => report.completed += 1,
            Some(Termination::Recorded(_)) => report.failed += 1,
            Some(Termination::AlreadyTerminal(status)) => {
                warn!(id = %id, status = ?status, "item was already terminal, outcome dropped");
            }
            None => {
                warn!(id = %id, "lease lost before terminate, outcome dropped");
                report.lost += 1;
            }
        }
        Ok(())
    }

    async fn reject(
        &self,
        id: CorrelationId,
        decode: QueueError,
        report: &mut TickReport,
    ) -> Result<(), QueueError> {
        warn!(id = %id, error = %decode, "rejecting undecodable item");
        let publish = self.config.publish_responses;
        let reason = decode.to_string();
        let rejected = blocking(&self.queue, move |queue| {
            let termination = match queue.reject(&id, &reason) {
                Ok(termination) => termination,
                Err(QueueError::NotClaimed(_)) => return Ok(false),
                Err(e) => return Err(e),
            };
            if publish && matches!(termination, Termination::Recorded(_)) {
                publish_response(queue, &id, &Outcome::failure(format!("undecodable item: {reason}")));
            }
            Ok(true)
        })
        .await?;

        if rejected {
            report.rejected += 1;
        } else {
            report.lost += 1;
        }
        Ok(())
    }
}

/// terminal record は既に書けているので、response の失敗はログだけ
fn publish_response(queue: &FsQueue, id: &CorrelationId, outcome: &Outcome) {
    let written = match outcome {
        Outcome::Success(value) => queue.respond(id, value.clone()),
        Outcome::Failure(message) => queue.respond_error(id, message),
    };
    if let Err(e) = written {
        warn!(id = %id, error = %e, "failed to publish response");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
