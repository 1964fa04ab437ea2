//! Outcome model: the settled result of one Queued Action.

use serde::{Deserialize, Serialize};

use super::errors::{ActionFailure, QueueError};
use super::ids::ActionId;

/// Classification of a settled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Failure,
}

/// Published exactly once per action, right after its operation settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub id: ActionId,
    pub result: Result<serde_json::Value, ActionFailure>,
}

impl ActionOutcome {
    pub fn success(id: ActionId, value: serde_json::Value) -> Self {
        Self {
            id,
            result: Ok(value),
        }
    }

    pub fn failure(id: ActionId, failure: ActionFailure) -> Self {
        Self {
            id,
            result: Err(failure),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self.result {
            Ok(_) => OutcomeKind::Success,
            Err(_) => OutcomeKind::Failure,
        }
    }

    /// Convert into what the awaiting caller receives.
    pub fn into_result(self) -> Result<serde_json::Value, QueueError> {
        let id = self.id;
        self.result.map_err(|failure| QueueError::ActionFailed {
            id,
            message: failure.message,
        })
    }
}
