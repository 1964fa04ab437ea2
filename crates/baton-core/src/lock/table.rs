//! Resource ID -> held lock, each with its expiry timer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::domain::LockInfo;

pub(super) struct LockEntry {
    /// Distinguishes successive locks on the same resource, so a timer only
    /// ever releases the lock it was scheduled for.
    pub(super) generation: u64,
    pub(super) timer: JoinHandle<()>,
    pub(super) info: LockInfo,
}

#[derive(Default)]
pub(super) struct LockTable {
    entries: Mutex<HashMap<String, LockEntry>>,
    generations: AtomicU64,
}

impl LockTable {
    // 同期的にしか触らないので std の Mutex で十分（await を跨がない）
    pub(super) fn lock(&self) -> MutexGuard<'_, HashMap<String, LockEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }

    /// Remove the entry for `resource_id`.
    ///
    /// With `Some(generation)`, only removes it if it is still that
    /// generation (the expiry path). `None` removes whatever is there (the
    /// explicit release path).
    pub(super) fn remove(&self, resource_id: &str, generation: Option<u64>) -> Option<LockEntry> {
        let mut entries = self.lock();
        let current = entries.get(resource_id)?.generation;
        if generation.is_some_and(|expected| expected != current) {
            return None;
        }
        entries.remove(resource_id)
    }
}

impl Drop for LockTable {
    fn drop(&mut self) {
        let entries = self.entries.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in entries.drain() {
            entry.timer.abort();
        }
    }
}
