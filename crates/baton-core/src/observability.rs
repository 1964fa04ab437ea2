use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::{ActionOutcome, OutcomeKind};

/// Point-in-time view of a queue's throughput.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    /// Submitted but not yet settled (includes the one currently running).
    pub pending: u64,
}

/// Lock-free counters updated by `submit` and the worker.
#[derive(Debug, Default)]
pub(crate) struct QueueStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl QueueStats {
    pub(crate) fn record_submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome(&self, outcome: &ActionOutcome) {
        match outcome.kind() {
            OutcomeKind::Success => self.completed.fetch_add(1, Ordering::Relaxed),
            OutcomeKind::Failure => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub(crate) fn snapshot(&self) -> QueueCounts {
        let submitted = self.submitted.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        QueueCounts {
            submitted,
            completed,
            failed,
            pending: submitted.saturating_sub(completed + failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionFailure, ActionId};

    #[test]
    fn snapshot_derives_pending() {
        let stats = QueueStats::default();
        stats.record_submit();
        stats.record_submit();
        stats.record_submit();
        stats.record_outcome(&ActionOutcome::success(ActionId::generate(), serde_json::Value::Null));
        stats.record_outcome(&ActionOutcome::failure(
            ActionId::generate(),
            ActionFailure::new("nope"),
        ));

        let counts = stats.snapshot();
        assert_eq!(
            counts,
            QueueCounts {
                submitted: 3,
                completed: 1,
                failed: 1,
                pending: 1,
            }
        );
    }
}
