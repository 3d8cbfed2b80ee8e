use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// One async lock per key, created on first use and dropped again once
/// nobody holds or waits for it.
pub(crate) struct KeyedLocks<K: Eq + Hash + Clone> {
    locks: parking_lot::Mutex<HashMap<K, Arc<RwLock<()>>>>,
}

/// Releases the key on drop.
pub(crate) struct KeyGuard<'a, K: Eq + Hash + Clone> {
    exclusive: Option<OwnedRwLockWriteGuard<()>>,
    shared: Option<OwnedRwLockReadGuard<()>>,
    key: K,
    owner: &'a KeyedLocks<K>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: &K) -> Arc<RwLock<()>> {
        self.locks.lock().entry(key.clone()).or_default().clone()
    }

    /// Exclusive access to `key`.
    pub(crate) async fn lock(&self, key: K) -> KeyGuard<'_, K> {
        let guard = self.entry(&key).write_owned().await;
        KeyGuard {
            exclusive: Some(guard),
            shared: None,
            key,
            owner: self,
        }
    }

    /// Access to `key` shared with other `share` holders, excluding `lock`.
    pub(crate) async fn share(&self, key: K) -> KeyGuard<'_, K> {
        let guard = self.entry(&key).read_owned().await;
        KeyGuard {
            exclusive: None,
            shared: Some(guard),
            key,
            owner: self,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        // Release first so the guard's own reference no longer counts.
        drop(self.exclusive.take());
        drop(self.shared.take());

        let mut locks = self.owner.locks.lock();
        // Waiters clone the Arc under this same mutex, so a count of one
        // means the map holds the only reference.
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}
