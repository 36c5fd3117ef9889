use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per key. A second caller for a busy key waits for the
/// first run to finish instead of starting a conflicting one.
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let slot = self.slot(key).await;
        slot.lock_owned().await
    }

    pub async fn try_lock(&self, key: &K) -> Option<OwnedMutexGuard<()>> {
        let slot = self.slot(key).await;
        slot.try_lock_owned().ok()
    }

    #[cfg(test)]
    pub async fn is_locked(&self, key: &K) -> bool {
        let locks = self.locks.lock().await;
        locks
            .get(key)
            .map(|slot| slot.try_lock().is_err())
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    async fn slot(&self, key: &K) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // Drop slots nobody holds or waits on.
        locks.retain(|_, slot| Arc::strong_count(slot) > 1);
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
