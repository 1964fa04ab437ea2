//! Queued Action: an operation tagged with its ID.

use std::fmt;

use tokio::sync::oneshot;

use crate::domain::{ActionId, ActionOutcome};
use crate::ports::Operation;

/// One unit of submitted work.
///
/// Creating an action does not run or schedule anything; it only pairs the
/// operation with an ID that callers can later await.
pub struct QueuedAction {
    id: ActionId,
    operation: Box<dyn Operation>,
}

impl QueuedAction {
    pub fn new(id: ActionId, operation: Box<dyn Operation>) -> Self {
        Self { id, operation }
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub(crate) fn into_parts(self) -> (ActionId, Box<dyn Operation>) {
        (self.id, self.operation)
    }
}

impl fmt::Debug for QueuedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedAction")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// What travels through the work channel: the action plus where its outcome goes.
pub(crate) struct WorkItem {
    pub(crate) action: QueuedAction,
    pub(crate) reply: oneshot::Sender<ActionOutcome>,
}
