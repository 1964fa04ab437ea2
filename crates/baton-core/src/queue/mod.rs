//! Serial Action Queue.
//!
//! Operations submitted from any number of callers run strictly one at a
//! time, in submission order, on a single worker task. Each caller collects
//! its own result by action ID.
//!
//! ```ignore
//! let queue = SerialQueue::new(&QueueConfig::default());
//! let action = queue.create_action(|| async { store.create_assignment(req).await });
//! let id = queue.submit(action)?;
//! let assignment: Assignment = queue.await_result_as(id).await?;
//! ```
//!
//! The work channel is unbounded: submissions are never rejected for
//! capacity, and sustained overproduction grows memory without limit.
//! There is no built-in deadline on `await_result`; wrap it in
//! `tokio::time::timeout` when a bounded wait is needed. A cancelled wait
//! leaves nothing behind, and the ID can still be submitted and awaited later.
//!
//! A submitted outcome stays in memory until someone awaits it. Use
//! `submit_detached` for fire-and-forget work.

mod action;
mod slots;
mod worker;

pub use action::QueuedAction;

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span};

use crate::config::QueueConfig;
use crate::domain::{ActionId, QueueError};
use crate::observability::{QueueCounts, QueueStats};
use crate::ports::{IdGenerator, SystemClock, UlidGenerator, boxed};
use action::WorkItem;
use slots::CompletionSlots;

/// Single-worker FIFO executor with per-action result retrieval.
pub struct SerialQueue {
    name: String,
    /// `None` once the queue is closed.
    work_tx: Mutex<Option<mpsc::UnboundedSender<WorkItem>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    slots: Arc<CompletionSlots>,
    ids: Arc<dyn IdGenerator>,
    stats: Arc<QueueStats>,
}

impl SerialQueue {
    /// Start a queue and its worker. Must be called inside a Tokio runtime.
    pub fn new(config: &QueueConfig) -> Self {
        Self::with_id_generator(config, Arc::new(UlidGenerator::new(SystemClock)))
    }

    pub fn with_id_generator(config: &QueueConfig, ids: Arc<dyn IdGenerator>) -> Self {
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(QueueStats::default());

        let span = info_span!("queue_worker", queue = %config.name);
        let worker = tokio::spawn(worker::worker_loop(work_rx, Arc::clone(&stats)).instrument(span));

        Self {
            name: config.name.clone(),
            work_tx: Mutex::new(Some(work_tx)),
            worker: Mutex::new(Some(worker)),
            slots: Arc::new(CompletionSlots::default()),
            ids,
            stats,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap `op` with a fresh ID. Nothing runs until the action is submitted.
    pub fn create_action<F, Fut, R, E>(&self, op: F) -> QueuedAction
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Serialize + Send + 'static,
        E: Display + Send + 'static,
    {
        QueuedAction::new(self.ids.generate_action_id(), boxed(op))
    }

    /// Append `action` to the pending work. Returns its ID for `await_result`.
    pub fn submit(&self, action: QueuedAction) -> Result<ActionId, QueueError> {
        let id = action.id();
        let work_tx = lock(&self.work_tx);
        let Some(work_tx) = work_tx.as_ref() else {
            return Err(QueueError::Closed);
        };

        let reply = self.slots.take_sender(id)?;
        work_tx
            .send(WorkItem { action, reply })
            .map_err(|_| QueueError::Closed)?;
        self.stats.record_submit();
        debug!(queue = %self.name, %id, "action submitted");
        Ok(id)
    }

    /// Append `action` without keeping its outcome.
    ///
    /// The action runs and is counted like any other, but its result is
    /// dropped unless a caller was already waiting on `id`.
    pub fn submit_detached(&self, action: QueuedAction) -> Result<ActionId, QueueError> {
        let id = action.id();
        let work_tx = lock(&self.work_tx);
        let Some(work_tx) = work_tx.as_ref() else {
            return Err(QueueError::Closed);
        };

        let reply = self.slots.take_sender_detached(id)?;
        work_tx
            .send(WorkItem { action, reply })
            .map_err(|_| QueueError::Closed)?;
        self.stats.record_submit();
        debug!(queue = %self.name, %id, "action submitted detached");
        Ok(id)
    }

    /// Wait for the outcome of `id`.
    ///
    /// Each ID's result can be claimed once. Waiting on an ID that is never
    /// submitted blocks until the queue is closed.
    pub async fn await_result(&self, id: ActionId) -> Result<serde_json::Value, QueueError> {
        let rx = {
            let work_tx = lock(&self.work_tx);
            self.slots.take_receiver(id, work_tx.is_none())?
        };
        let mut guard = ForgetOnDrop {
            slots: &self.slots,
            id,
            armed: true,
        };
        let outcome = rx.await;
        guard.armed = false;
        outcome.map_err(|_| QueueError::Closed)?.into_result()
    }

    /// `await_result`, decoded into `R`.
    pub async fn await_result_as<R: DeserializeOwned>(&self, id: ActionId) -> Result<R, QueueError> {
        let value = self.await_result(id).await?;
        serde_json::from_value(value).map_err(|e| QueueError::Decode {
            id,
            message: e.to_string(),
        })
    }

    /// Create, submit and await in one call.
    pub async fn run<F, Fut, R, E>(&self, op: F) -> Result<serde_json::Value, QueueError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Serialize + Send + 'static,
        E: Display + Send + 'static,
    {
        let id = self.submit(self.create_action(op))?;
        self.await_result(id).await
    }

    /// `run`, decoded back into the operation's own result type.
    pub async fn run_as<F, Fut, R, E>(&self, op: F) -> Result<R, QueueError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Serialize + DeserializeOwned + Send + 'static,
        E: Display + Send + 'static,
    {
        let id = self.submit(self.create_action(op))?;
        self.await_result_as(id).await
    }

    pub fn counts(&self) -> QueueCounts {
        self.stats.snapshot()
    }

    /// IDs with a result not yet claimed, or a waiter not yet matched.
    pub fn unclaimed(&self) -> usize {
        self.slots.len()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.work_tx).is_none()
    }

    /// Stop accepting submissions. Already-submitted actions still run.
    pub fn close(&self) {
        let mut work_tx = lock(&self.work_tx);
        if work_tx.take().is_some() {
            let abandoned = self.slots.abandon_unsubmitted();
            debug!(queue = %self.name, abandoned, "queue closed");
        }
    }

    /// Close, then wait until the worker has drained everything submitted.
    pub async fn shutdown_and_join(&self) {
        self.close();
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            // ignore join error: the worker itself never panics
            let _ = worker.await;
        }
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        // Dropping the sender lets the worker finish the backlog and exit.
        self.close();
    }
}

/// Drops the slot of a wait cancelled before its ID was submitted.
struct ForgetOnDrop<'a> {
    slots: &'a CompletionSlots,
    id: ActionId,
    armed: bool,
}

impl Drop for ForgetOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed && self.slots.forget(self.id) {
            debug!(id = %self.id, "cancelled wait forgotten");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
