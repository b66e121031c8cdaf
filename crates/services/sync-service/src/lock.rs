//! Per-target advisory locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use common::{SyncError, SyncResult};

type Slots = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Keyed async mutex: one holder per key, different keys never contend.
#[derive(Clone, Default)]
pub struct KeyedLock {
    slots: Slots,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting at most `wait`.
    ///
    /// # Errors
    /// Returns `SyncError::Concurrency` when the wait elapses.
    pub async fn acquire(&self, key: &str, wait: Duration) -> SyncResult<KeyGuard> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        match tokio::time::timeout(wait, slot.lock_owned()).await {
            Ok(guard) => {
                debug!(key = %key, "Lock acquired");
                Ok(KeyGuard {
                    key: key.to_string(),
                    slots: Arc::clone(&self.slots),
                    guard: Some(guard),
                })
            }
            Err(_) => {
                self.prune(key);
                Err(SyncError::concurrency(key))
            }
        }
    }

    /// Whether anyone currently holds or waits for `key`.
    pub fn is_held(&self, key: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.contains_key(key)
    }

    fn prune(&self, key: &str) {
        prune(&self.slots, key);
    }
}

/// Drop the slot for `key` once nobody else references it.
fn prune(slots: &Slots, key: &str) {
    let mut slots = slots.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(slot) = slots.get(key) {
        if Arc::strong_count(slot) == 1 {
            slots.remove(key);
        }
    }
}

/// Held lock; released on drop.
pub struct KeyGuard {
    key: String,
    slots: Slots,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // The owned guard keeps its own Arc to the slot
        drop(self.guard.take());
        prune(&self.slots, &self.key);
        debug!(key = %self.key, "Lock released");
    }
}
