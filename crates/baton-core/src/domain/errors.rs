//! Errors - queue error taxonomy.
//!
//! Lock contention is not an error (it is a `false` from `acquire_lock`), so
//! everything here belongs to the Serial Action Queue.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::ActionId;

/// Failure detail captured from one operation.
///
/// Carries the message exactly as the operation produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ActionFailure {
    pub message: String,
}

impl ActionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn panicked(detail: &str) -> Self {
        Self::new(format!("operation panicked: {detail}"))
    }
}

/// Errors surfaced to queue callers.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The operation behind `id` failed. Only the caller awaiting `id` sees this.
    #[error("action {id} failed: {message}")]
    ActionFailed { id: ActionId, message: String },

    #[error("result for action {0} has already been claimed")]
    AlreadyAwaited(ActionId),

    #[error("action {0} was already submitted")]
    DuplicateAction(ActionId),

    #[error("queue is closed")]
    Closed,

    #[error("could not decode result of action {id}: {message}")]
    Decode { id: ActionId, message: String },
}

impl QueueError {
    /// The original failure message, when this error wraps an operation failure.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            QueueError::ActionFailed { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_failed_keeps_original_message() {
        let id = ActionId::generate();
        let err = QueueError::ActionFailed {
            id,
            message: "asset already assigned".to_string(),
        };

        assert_eq!(err.failure_message(), Some("asset already assigned"));
        assert!(err.to_string().contains(&id.to_string()));
        assert!(err.to_string().ends_with("asset already assigned"));
    }

    #[test]
    fn other_errors_have_no_failure_message() {
        assert_eq!(QueueError::Closed.failure_message(), None);
    }

    #[test]
    fn panicked_failure_is_labelled() {
        let failure = ActionFailure::panicked("boom");
        assert_eq!(failure.to_string(), "operation panicked: boom");
    }
}
