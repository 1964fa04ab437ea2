//! Timed Resource Lock.
//!
//! At most one holder per resource ID, released explicitly or automatically
//! once its timeout elapses. Contention is reported as `false`, never as an
//! error.
//!
//! This coordinates callers inside one process only. Two processes holding
//! their own `TimedLock` do not see each other's locks.
//!
//! State per resource ID:
//! - UNLOCKED -> LOCKED: `acquire_lock` succeeds
//! - LOCKED -> UNLOCKED: `release_lock`, or the expiry timer fires
//! - LOCKED + `acquire_lock`: rejected (`false`), no state change

mod table;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::LockConfig;
use crate::domain::LockInfo;
use crate::ports::{Clock, SystemClock};
use table::{LockEntry, LockTable};

/// In-memory, auto-expiring lock keyed by resource ID.
///
/// Cheap to clone; clones share the same table. Dropping the last clone
/// cancels every pending expiry timer. Acquiring spawns a timer task, so it
/// must happen inside a Tokio runtime.
#[derive(Clone)]
pub struct TimedLock {
    table: Arc<LockTable>,
    default_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl TimedLock {
    pub fn new(config: &LockConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &LockConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Arc::new(LockTable::default()),
            default_timeout: config.default_timeout(),
            clock,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Lock `resource_id` for the default timeout.
    pub fn acquire_lock(&self, resource_id: &str) -> bool {
        self.acquire_lock_for(resource_id, self.default_timeout)
    }

    /// Lock `resource_id` for `timeout`.
    ///
    /// Returns `false` if it is already locked, including by the same caller:
    /// a held lock cannot be refreshed by acquiring it again.
    pub fn acquire_lock_for(&self, resource_id: &str, timeout: Duration) -> bool {
        let mut entries = self.table.lock();
        if entries.contains_key(resource_id) {
            trace!(resource_id, "lock contended");
            return false;
        }

        let generation = self.table.next_generation();
        // Deadline is fixed now, not when the timer task first gets polled.
        let deadline = Instant::now().checked_add(timeout);
        let timer = {
            let table = Arc::downgrade(&self.table);
            let resource_id = resource_id.to_string();
            tokio::spawn(async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
                // table が既に drop されていれば何もしない
                if let Some(table) = table.upgrade()
                    && table.remove(&resource_id, Some(generation)).is_some()
                {
                    debug!(resource_id = %resource_id, "lock expired");
                }
            })
        };

        let acquired_at = self.clock.now();
        let info = LockInfo {
            resource_id: resource_id.to_string(),
            acquired_at,
            expires_at: expiry(acquired_at, timeout),
        };
        entries.insert(
            resource_id.to_string(),
            LockEntry {
                generation,
                timer,
                info,
            },
        );
        debug!(resource_id, ?timeout, "lock acquired");
        true
    }

    /// Release `resource_id` and cancel its expiry timer. No-op when unlocked.
    pub fn release_lock(&self, resource_id: &str) {
        if let Some(entry) = self.table.remove(resource_id, None) {
            entry.timer.abort();
            debug!(resource_id, "lock released");
        }
    }

    pub fn is_locked(&self, resource_id: &str) -> bool {
        self.table.lock().contains_key(resource_id)
    }

    pub fn lock_info(&self, resource_id: &str) -> Option<LockInfo> {
        self.table.lock().get(resource_id).map(|e| e.info.clone())
    }

    /// Snapshot of every held lock, ordered by resource ID.
    pub fn active_locks(&self) -> Vec<LockInfo> {
        let mut locks: Vec<LockInfo> = self.table.lock().values().map(|e| e.info.clone()).collect();
        locks.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        locks
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}

impl std::fmt::Debug for TimedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedLock")
            .field("default_timeout", &self.default_timeout)
            .field("held", &self.len())
            .finish()
    }
}

fn expiry(acquired_at: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|d| acquired_at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;
    use rstest::rstest;

    fn locks() -> TimedLock {
        TimedLock::new(&LockConfig::default())
    }

    /// Let the runtime run any timer task that became ready.
    async fn advance(by: Duration) {
        tokio::time::sleep(by).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn second_acquire_fails_until_release() {
        let locks = locks();

        assert!(locks.acquire_lock("r1"));
        assert!(!locks.acquire_lock("r1"));

        locks.release_lock("r1");
        assert!(locks.acquire_lock("r1"));
    }

    #[tokio::test(start_paused = true)]
    async fn lock_expires_on_its_own() {
        let locks = locks();

        assert!(locks.acquire_lock_for("r2", Duration::from_secs(1)));
        advance(Duration::from_millis(1_001)).await;

        assert!(!locks.is_locked("r2"));
        assert!(locks.acquire_lock("r2"));
    }

    #[rstest]
    #[case::just_before(Duration::from_millis(2_999), true)]
    #[case::just_after(Duration::from_millis(3_001), false)]
    #[tokio::test(start_paused = true)]
    async fn default_timeout_is_three_seconds(#[case] wait: Duration, #[case] still_locked: bool) {
        let locks = locks();
        assert_eq!(locks.default_timeout(), Duration::from_secs(3));

        assert!(locks.acquire_lock("asset-7"));
        advance(wait).await;
        assert_eq!(locks.is_locked("asset-7"), still_locked);
    }

    #[tokio::test(start_paused = true)]
    async fn release_of_unknown_resource_is_a_noop() {
        let locks = locks();
        locks.release_lock("never-locked");
        assert!(locks.is_empty());
        assert!(locks.active_locks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn release_is_idempotent() {
        let locks = locks();
        assert!(locks.acquire_lock("r1"));
        locks.release_lock("r1");
        locks.release_lock("r1");
        assert!(!locks.is_locked("r1"));
    }

    #[tokio::test(start_paused = true)]
    async fn independent_resources_do_not_interfere() {
        let locks = locks();

        assert!(locks.acquire_lock("r3"));
        assert!(locks.acquire_lock("r4"));
        assert_eq!(locks.len(), 2);

        locks.release_lock("r3");
        assert!(!locks.is_locked("r3"));
        assert!(locks.is_locked("r4"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_does_not_release_a_newer_lock() {
        let locks = locks();

        assert!(locks.acquire_lock_for("r5", Duration::from_secs(1)));
        locks.release_lock("r5");
        assert!(locks.acquire_lock_for("r5", Duration::from_secs(10)));

        // First lock's deadline passes; the second one must survive it.
        advance(Duration::from_secs(2)).await;
        assert!(locks.is_locked("r5"));

        advance(Duration::from_secs(9)).await;
        assert!(!locks.is_locked("r5"));
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_the_table() {
        let locks = locks();
        let other = locks.clone();

        assert!(locks.acquire_lock("shared"));
        assert!(!other.acquire_lock("shared"));
        other.release_lock("shared");
        assert!(locks.acquire_lock("shared"));
    }

    #[tokio::test(start_paused = true)]
    async fn lock_info_reports_expiry() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let locks = TimedLock::with_clock(&LockConfig::default(), Arc::new(FixedClock::new(at)));

        assert!(locks.acquire_lock_for("asset-1", Duration::from_secs(5)));
        let info = locks.lock_info("asset-1").unwrap();
        assert_eq!(info.acquired_at, at);
        assert_eq!(info.expires_at, at + chrono::Duration::seconds(5));
        assert!(locks.lock_info("asset-2").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn active_locks_are_sorted() {
        let locks = locks();
        assert!(locks.acquire_lock("b"));
        assert!(locks.acquire_lock("a"));

        let ids: Vec<_> = locks
            .active_locks()
            .into_iter()
            .map(|l| l.resource_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn only_one_of_many_racers_wins() {
        let locks = locks();
        let mut racers = Vec::new();
        for _ in 0..32 {
            let locks = locks.clone();
            racers.push(tokio::spawn(async move { locks.acquire_lock("contended") }));
        }

        let mut winners = 0;
        for r in racers {
            if r.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout_holds_until_released() {
        let locks = locks();

        assert!(locks.acquire_lock_for("forever", Duration::MAX));
        let info = locks.lock_info("forever").unwrap();
        assert_eq!(info.expires_at, DateTime::<Utc>::MAX_UTC);

        advance(Duration::from_secs(365 * 24 * 60 * 60)).await;
        assert!(locks.is_locked("forever"));

        locks.release_lock("forever");
        assert!(!locks.is_locked("forever"));
    }

    #[test]
    fn huge_timeout_saturates_expiry() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(expiry(at, Duration::MAX), DateTime::<Utc>::MAX_UTC);
    }
}
