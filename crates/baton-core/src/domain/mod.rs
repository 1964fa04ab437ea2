//! Domain model (IDs, outcomes, errors, lock snapshots).

pub mod errors;
pub mod ids;
pub mod lock;
pub mod outcome;

pub use self::errors::{ActionFailure, QueueError};
pub use self::ids::{Action, ActionId, Id, IdMarker};
pub use self::lock::LockInfo;
pub use self::outcome::{ActionOutcome, OutcomeKind};
