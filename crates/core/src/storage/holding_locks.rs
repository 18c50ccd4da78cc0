use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Proof that the caller holds the write lock of one holding.
///
/// Dropping the guard releases the lock and forgets the key once nobody
/// else holds or waits on it.
pub struct HoldingLockGuard {
    key: String,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for HoldingLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Acquirers clone the Arc under the shard lock, so a count of one
        // means the map holds the only reference.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Per-holding async mutexes keyed by holding id.
///
/// Every read-plan-commit sequence that touches a holding's lots runs while
/// holding the matching guard, so two sells can never plan against the
/// same `remaining_quantity`. Only keys that are held or awaited stay in the
/// map.
#[derive(Default)]
pub struct HoldingLocks {
    locks: Arc<LockMap>,
}

impl HoldingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn acquire(&self, key: &str) -> HoldingLockGuard {
        // Clone the Arc out so the map shard is not held across the await.
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        HoldingLockGuard {
            key: key.to_string(),
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
