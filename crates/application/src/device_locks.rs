use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-key async mutexes serializing work on one device.
///
/// Waiters queue in FIFO order per key. Keys with no holder and no waiter
/// are pruned on the next acquisition.
#[derive(Debug, Clone, Default)]
pub struct DeviceLocks {
    slots: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Exclusive ownership of one key, released on drop.
#[derive(Debug)]
pub struct DeviceLockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl DeviceLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the key is free and takes ownership of it.
    pub async fn acquire(&self, key: &str) -> DeviceLockGuard {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        DeviceLockGuard {
            _guard: slot.lock_owned().await,
        }
    }

    /// Returns the number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
