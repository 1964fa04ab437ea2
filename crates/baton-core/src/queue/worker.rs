//! The single worker that drains the work channel.
//!
//! # フロー
//! 1. recv() で次の WorkItem を取る（FIFO）
//! 2. operation を別 task で実行し、完了まで待つ
//! 3. ActionOutcome を reply に送る
//! 4. channel が閉じて空になったら終了

use std::any::Any;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use super::action::{QueuedAction, WorkItem};
use crate::domain::{ActionFailure, ActionOutcome};
use crate::observability::QueueStats;

pub(crate) async fn worker_loop(mut rx: mpsc::UnboundedReceiver<WorkItem>, stats: Arc<QueueStats>) {
    info!("worker started");

    while let Some(WorkItem { action, reply }) = rx.recv().await {
        let outcome = settle(action).await;
        stats.record_outcome(&outcome);

        let id = outcome.id;
        if reply.send(outcome).is_err() {
            // 呼び出し側が待つのをやめた（自前の timeout など）
            debug!(%id, "no caller waiting; outcome dropped");
        }
    }

    info!("worker stopped");
}

/// Run one action to completion and capture how it settled.
///
/// The operation runs in its own task so a panic is contained to this action.
/// It is awaited before returning, so the next action never overlaps it.
async fn settle(action: QueuedAction) -> ActionOutcome {
    let (id, operation) = action.into_parts();
    debug!(%id, "action started");

    let result = match tokio::spawn(operation.run()).await {
        Ok(result) => result,
        Err(join_err) => Err(failure_from_join_error(join_err)),
    };

    match result {
        Ok(value) => {
            debug!(%id, "action succeeded");
            ActionOutcome::success(id, value)
        }
        Err(failure) => {
            warn!(%id, error = %failure, "action failed");
            ActionOutcome::failure(id, failure)
        }
    }
}

fn failure_from_join_error(err: JoinError) -> ActionFailure {
    if err.is_cancelled() {
        return ActionFailure::new("operation was cancelled");
    }
    let payload = err.into_panic();
    ActionFailure::panicked(&panic_detail(payload.as_ref()))
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
