//! End-to-end scenarios against a real directory.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use courier_core::ports::{FixedClock, SequentialIdGenerator};
use courier_core::store::Termination;
use courier_core::{
    AppBuilder, CorrelationId, FsQueue, Handler, HandlerError, ItemStatus, Outcome, QueueConfig,
    QueueError, Task,
};

#[derive(Debug, Serialize, Deserialize)]
struct PlanRequest {
    task: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Plan {
    result: String,
}

impl Task for PlanRequest {
    const KIND: &'static str = "plan-request";
    type Response = Plan;
}

struct Planner;

#[async_trait]
impl Handler<PlanRequest> for Planner {
    async fn handle(&self, request: PlanRequest) -> Result<Plan, HandlerError> {
        Ok(Plan {
            result: format!("ok: {}", request.task),
        })
    }
}

fn config(dir: &TempDir) -> QueueConfig {
    QueueConfig::new(dir.path().join("queue"))
        .with_poll_interval(Duration::from_millis(20))
        .with_sweep_interval(Duration::from_millis(50))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bridge_happy_path() {
    let dir = TempDir::new().unwrap();
    let app = AppBuilder::new(config(&dir))
        .register::<PlanRequest, _>(Planner)
        .unwrap()
        .build()
        .unwrap();

    let token = CancellationToken::new();
    let workers = tokio::spawn({
        let app = app.clone();
        let token = token.clone();
        async move { app.run(token).await }
    });

    let plan = app
        .bridge()
        .request(
            &PlanRequest {
                task: "demo".into(),
            },
            Duration::from_secs(10),
            &token,
        )
        .await
        .unwrap();
    assert_eq!(
        plan,
        Plan {
            result: "ok: demo".into()
        }
    );

    token.cancel();
    workers.await.unwrap();

    let counts = app.queue().counts().unwrap();
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.pending + counts.claimed, 0);
    // response は読んだ時点で消えている
    assert_eq!(counts.responses, 0);
}

#[tokio::test]
async fn bridge_timeout_leaves_request_pending_and_late_result_is_retrievable() {
    let dir = TempDir::new().unwrap();
    let app = AppBuilder::new(config(&dir))
        .register::<PlanRequest, _>(Planner)
        .unwrap()
        .build()
        .unwrap();

    let token = CancellationToken::new();
    let started = std::time::Instant::now();
    let err = app
        .bridge()
        .request_and_wait(
            PlanRequest::KIND,
            json!({"task": "slow"}),
            Duration::from_secs(2),
            &token,
        )
        .await
        .unwrap_err();
    assert!(started.elapsed() >= Duration::from_secs(2));

    let id = match err {
        QueueError::Timeout { id, .. } => id,
        other => panic!("expected timeout, got {other:?}"),
    };
    let pending = app.queue().peek(&id).unwrap().expect("still pending");
    assert_eq!(pending.payload, json!({"task": "slow"}));

    // worker が後から来ても結果は outcome で拾える
    app.processor().run_once().await.unwrap();
    let (status, record) = app.queue().outcome(&id).unwrap().unwrap();
    assert_eq!(status, ItemStatus::Completed);
    assert_eq!(record.result, Some(json!({"result": "ok: slow"})));
}

#[tokio::test]
async fn crashed_worker_is_recovered_by_the_sweeper() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
    ));
    let queue = FsQueue::new(dir.path().join("queue"))
        .with_clock(clock.clone())
        .with_id_generator(Arc::new(SequentialIdGenerator::new(clock.clone())));
    let lease = Duration::from_secs(60);
    let app = AppBuilder::new(config(&dir).with_lease(lease))
        .with_queue(queue)
        .register::<PlanRequest, _>(Planner)
        .unwrap()
        .build()
        .unwrap();
    let queue = app.queue().clone();

    let id = queue.submit(&PlanRequest { task: "x".into() }).unwrap();
    // claim したまま worker が死んだ
    queue.claim(&id).unwrap().unwrap();

    clock.advance(lease / 2);
    assert_eq!(app.sweeper().sweep_once().await.unwrap().reclaimed, 0);
    assert_eq!(queue.status_of(&id).unwrap(), Some(ItemStatus::Claimed));

    clock.advance(lease);
    assert_eq!(app.sweeper().sweep_once().await.unwrap().reclaimed, 1);
    assert_eq!(queue.status_of(&id).unwrap(), Some(ItemStatus::Pending));

    let report = app.processor().run_once().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(queue.status_of(&id).unwrap(), Some(ItemStatus::Completed));

    // 死んだ worker が戻ってきても terminal は変わらない
    let late = queue.terminate(&id, Outcome::failure("zombie")).unwrap();
    assert_eq!(late, Termination::AlreadyTerminal(ItemStatus::Completed));
}

#[test]
fn concurrent_claimers_never_share_an_item() {
    let dir = TempDir::new().unwrap();
    let queue = FsQueue::open(dir.path()).unwrap();
    let total = 50;
    for i in 0..total {
        queue.enqueue("k", json!({ "i": i })).unwrap();
    }

    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let queue = queue.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                let mut won: Vec<CorrelationId> = Vec::new();
                for id in queue.list_pending().unwrap() {
                    if queue.claim(&id).unwrap().is_some() {
                        won.push(id);
                    }
                }
                won
            })
        })
        .collect();

    let mut seen = HashSet::new();
    let mut claimed = 0;
    for handle in handles {
        for id in handle.join().unwrap() {
            claimed += 1;
            assert!(seen.insert(id), "item claimed twice");
        }
    }
    assert_eq!(claimed, total);
    assert_eq!(queue.counts().unwrap().claimed, total);
}

#[test]
fn terminate_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let queue = FsQueue::open(dir.path()).unwrap();
    let id = queue.enqueue("k", json!({"n": 1})).unwrap();
    let item = queue.claim(&id).unwrap().unwrap();
    assert_eq!(item.payload, json!({"n": 1}));

    let first = queue.terminate(&id, Outcome::Success(json!("done"))).unwrap();
    let second = queue.terminate(&id, Outcome::Success(json!("done"))).unwrap();
    assert_eq!(first, Termination::Recorded(ItemStatus::Completed));
    assert_eq!(second, Termination::AlreadyTerminal(ItemStatus::Completed));

    let unknown = CorrelationId::new("never-seen").unwrap();
    let err = queue.terminate(&unknown, Outcome::failure("x")).unwrap_err();
    assert!(matches!(err, QueueError::NotClaimed(_)));
}
