//! Lock snapshot type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only view of one active resource lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub resource_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Whether the expiry time has passed at `now`.
    ///
    /// The auto-release timer is what actually frees the lock; this is only
    /// informational.
    #[must_use]
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
