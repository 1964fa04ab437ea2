use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use baton_core::{App, BatonConfig};

/// Simulates concurrent "create assignment" requests: each one locks its
/// asset, serializes the write through the queue, then releases the lock.
#[derive(Debug, Parser)]
#[command(name = "baton", version)]
struct Cli {
    /// JSON config file (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of concurrent requests.
    #[arg(long, default_value_t = 8)]
    requests: usize,

    /// Every k-th request's write fails (0 = never).
    #[arg(long, default_value_t = 0)]
    fail_every: usize,

    /// Overrides `lock.default_timeout_secs`.
    #[arg(long)]
    lock_timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Assignment {
    id: usize,
    asset: String,
    staff: String,
}

/// The persistence layer the queue protects from racing writes.
#[async_trait]
trait AssignmentStore: Send + Sync {
    async fn create_assignment(&self, asset: &str, staff: &str) -> Result<Assignment, String>;
}

#[derive(Default)]
struct InMemoryStore {
    rows: Mutex<Vec<Assignment>>,
}

#[async_trait]
impl AssignmentStore for InMemoryStore {
    async fn create_assignment(&self, asset: &str, staff: &str) -> Result<Assignment, String> {
        // read -> (await) -> write: racing callers would both pass the check
        let taken = self.rows.lock().await.iter().any(|a| a.asset == asset);
        sleep(Duration::from_millis(10)).await;
        if taken {
            return Err(format!("asset {asset} is already assigned"));
        }

        let mut rows = self.rows.lock().await;
        let row = Assignment {
            id: rows.len() + 1,
            asset: asset.to_string(),
            staff: staff.to_string(),
        };
        rows.push(row.clone());
        Ok(row)
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum RequestReport {
    Created { request: usize, assignment: Assignment },
    Failed { request: usize, error: String },
    Busy { request: usize, asset: String },
}

async fn handle_request(
    app: Arc<App>,
    store: Arc<dyn AssignmentStore>,
    request: usize,
    fail: bool,
) -> RequestReport {
    let asset = format!("LA{:06}", request % 3);
    let staff = format!("SD{:04}", request);

    if !app.locks.acquire_lock(&asset) {
        return RequestReport::Busy { request, asset };
    }

    let result = {
        let asset = asset.clone();
        app.queue
            .run_as(move || async move {
                if fail {
                    return Err("simulated store failure".to_string());
                }
                store.create_assignment(&asset, &staff).await
            })
            .await
    };
    app.locks.release_lock(&asset);

    match result {
        Ok(assignment) => RequestReport::Created { request, assignment },
        Err(e) => RequestReport::Failed {
            request,
            error: e.to_string(),
        },
    }
}

/// `RUST_LOG` directives when set, `info` otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives.unwrap_or_default())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BatonConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BatonConfig::default(),
    };
    if let Some(secs) = cli.lock_timeout {
        config.lock.default_timeout_secs = secs;
    }

    let app = Arc::new(App::builder().config(config).build()?);
    let store: Arc<dyn AssignmentStore> = Arc::new(InMemoryStore::default());

    let mut handles = Vec::with_capacity(cli.requests);
    for request in 1..=cli.requests {
        let fail = cli.fail_every > 0 && request % cli.fail_every == 0;
        handles.push(tokio::spawn(handle_request(
            Arc::clone(&app),
            Arc::clone(&store),
            request,
            fail,
        )));
    }

    for handle in handles {
        let report = handle.await.context("request task panicked")?;
        println!("{}", serde_json::to_string(&report)?);
    }

    app.shutdown().await;
    println!("{}", serde_json::to_string(&app.queue.counts())?);
    tracing::info!(locks_held = app.locks.len(), "done");
    Ok(())
}
