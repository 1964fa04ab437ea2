//! AppBuilder - wires config, clock and ID generation into an `App`.
//!
//! # Fail-fast 設計
//! Invalid configuration is rejected by `build()`, before any worker or
//! timer is started.

use std::sync::Arc;

use crate::config::BatonConfig;
use crate::lock::TimedLock;
use crate::ports::{Clock, SystemClock, UlidGenerator};
use crate::queue::SerialQueue;

/// Builds an `App`.
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .config(BatonConfig::load(path)?)
///     .build()?;
/// ```
pub struct AppBuilder {
    config: BatonConfig,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("lock default_timeout_secs must be greater than zero")]
    InvalidLockTimeout,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: BatonConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(mut self, config: BatonConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock used for action IDs and lock snapshots.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate and start. Must be called inside a Tokio runtime (the queue
    /// worker is spawned here).
    pub fn build(self) -> Result<App, BuildError> {
        if self.config.lock.default_timeout_secs == 0 {
            return Err(BuildError::InvalidLockTimeout);
        }

        let ids = Arc::new(UlidGenerator::new(Arc::clone(&self.clock)));
        let queue = SerialQueue::with_id_generator(&self.config.queue, ids);
        let locks = TimedLock::with_clock(&self.config.lock, self.clock);

        Ok(App {
            config: self.config,
            queue,
            locks,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The two components, ready to hand to a request layer.
///
/// They are independent: neither calls the other.
pub struct App {
    pub config: BatonConfig,
    pub queue: SerialQueue,
    pub locks: TimedLock,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Close the queue and wait for its backlog. Held locks are left to
    /// expire or be released by their holders.
    pub async fn shutdown(&self) {
        self.queue.shutdown_and_join().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockConfig;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_build_with_defaults() {
        let app = App::builder().build().unwrap();
        assert_eq!(app.queue.name(), "default");
        assert_eq!(app.locks.default_timeout().as_secs(), 3);
    }

    #[tokio::test]
    async fn test_build_rejects_zero_timeout() {
        let config = BatonConfig {
            lock: LockConfig {
                default_timeout_secs: 0,
            },
            ..BatonConfig::default()
        };
        let app = AppBuilder::new().config(config).build();
        assert!(matches!(app, Err(BuildError::InvalidLockTimeout)));
    }

    #[tokio::test]
    async fn test_clock_flows_into_ids() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let app = App::builder()
            .clock(Arc::new(FixedClock::new(at)))
            .build()
            .unwrap();

        let action = app.queue.create_action(|| async { Ok::<_, String>(()) });
        assert_eq!(
            action.id().as_ulid().timestamp_ms(),
            at.timestamp_millis() as u64
        );
    }

    #[tokio::test]
    async fn test_queue_and_locks_work_together() {
        let app = App::builder().build().unwrap();

        assert!(app.locks.acquire_lock("asset-1"));
        let value = app.queue.run(|| async { Ok::<_, String>("assigned") }).await.unwrap();
        app.locks.release_lock("asset-1");

        assert_eq!(value, serde_json::json!("assigned"));
        app.shutdown().await;
        assert!(app.queue.is_closed());
    }
}
