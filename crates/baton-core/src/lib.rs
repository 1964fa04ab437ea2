//! baton-core
//!
//! Two small in-process concurrency utilities:
//! - **queue**: Serial Action Queue. Async operations from many callers run
//!   one at a time in submission order; each caller awaits its own result
//!   by action ID.
//! - **lock**: Timed Resource Lock. At most one holder per resource ID, with
//!   automatic release after a timeout.
//!
//! The two share no state. `app::AppBuilder` wires both from a `BatonConfig`.
//!
//! # モジュール構成
//! - **domain**: IDs, outcomes, errors, lock snapshots
//! - **ports**: Clock, IdGenerator, Operation (type-erased work)
//! - **config**: serde config with defaults
//! - **app**: builder and wiring

pub mod app;
pub mod config;
pub mod domain;
pub mod lock;
pub mod observability;
pub mod ports;
pub mod queue;

pub use app::{App, AppBuilder, BuildError};
pub use config::{BatonConfig, ConfigError, LockConfig, QueueConfig};
pub use domain::{ActionFailure, ActionId, ActionOutcome, LockInfo, OutcomeKind, QueueError};
pub use lock::TimedLock;
pub use observability::QueueCounts;
pub use queue::{QueuedAction, SerialQueue};
