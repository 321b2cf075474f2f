//! courier - file queue demo
//!
//! ```text
//! courier [demo] [ROOT]   # worker を立てて request を 2 件投げる
//! courier serve [ROOT]    # Ctrl-C まで worker / sweeper / gc を回す
//! ```
//!
//! ログは `RUST_LOG` で調整（既定は info）。

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use courier_core::{App, AppBuilder, Handler, HandlerError, QueueConfig, QueueError, Task};

#[derive(Debug, Serialize, Deserialize)]
struct PlanRequest {
    task: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Plan {
    steps: Vec<String>,
}

impl Task for PlanRequest {
    const KIND: &'static str = "plan-request";
    type Response = Plan;
}

struct Planner;

#[async_trait]
impl Handler<PlanRequest> for Planner {
    async fn handle(&self, request: PlanRequest) -> Result<Plan, HandlerError> {
        let task = request.task.trim();
        if task.is_empty() {
            return Err(HandlerError::new("nothing to plan"));
        }
        // それっぽい処理時間
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(Plan {
            steps: vec![
                format!("analyse {task}"),
                format!("implement {task}"),
                format!("verify {task}"),
            ],
        })
    }
}

enum Mode {
    Demo,
    Serve,
}

fn parse_args() -> (Mode, PathBuf) {
    let mut args = std::env::args().skip(1).peekable();
    let mode = match args.peek().map(String::as_str) {
        Some("serve") => {
            args.next();
            Mode::Serve
        }
        Some("demo") => {
            args.next();
            Mode::Demo
        }
        _ => Mode::Demo,
    };
    let root = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("courier-demo"));
    (mode, root)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let (mode, root) = parse_args();

    let config = QueueConfig::new(&root).with_poll_interval(Duration::from_millis(100));
    let app = AppBuilder::new(config)
        .register::<PlanRequest, _>(Planner)?
        .expect_kinds(&[PlanRequest::KIND])
        .build()?;

    let token = CancellationToken::new();
    let workers = tokio::spawn({
        let app = app.clone();
        let token = token.clone();
        async move { app.run(token).await }
    });

    match mode {
        Mode::Demo => demo(&app, &token).await,
        Mode::Serve => {
            info!(root = %root.display(), "serving, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
        }
    }

    token.cancel();
    workers.await?;

    let counts = app.queue().counts()?;
    info!(?counts, "bye");
    Ok(())
}

async fn demo(app: &App, token: &CancellationToken) {
    let bridge = app.bridge();
    let timeout = bridge.default_timeout();

    let request = PlanRequest {
        task: "file queue".to_string(),
    };
    match bridge.request(&request, timeout, token).await {
        Ok(plan) => {
            for (i, step) in plan.steps.iter().enumerate() {
                println!("{}. {step}", i + 1);
            }
        }
        Err(e) => warn!(error = %e, "plan request failed"),
    }

    // handler の業務エラーは Remote として返ってくる
    let empty = PlanRequest {
        task: String::new(),
    };
    match bridge.request(&empty, timeout, token).await {
        Err(QueueError::Remote { id, message }) => {
            println!("request {id} was refused: {message}");
        }
        Err(e) => warn!(error = %e, "unexpected error"),
        Ok(plan) => warn!(?plan, "empty task was planned"),
    }
}
