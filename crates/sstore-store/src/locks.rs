//! Per-name reader/writer locks.
//!
//! A save holds the write lock for its name across both artifact writes; a
//! load holds the read lock across both reads. Different names never contend.
//! Entries are held weakly and pruned once no task references them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use sstore_core::SafeName;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

#[derive(Debug, Default)]
pub struct NameLocks {
    entries: Mutex<HashMap<String, Weak<RwLock<()>>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn write(&self, name: &SafeName) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(name).write_owned().await
    }

    pub async fn read(&self, name: &SafeName) -> OwnedRwLockReadGuard<()> {
        self.lock_for(name).read_owned().await
    }

    /// Number of names with a live lock.
    pub fn live(&self) -> usize {
        let map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        map.values().filter(|w| w.strong_count() > 0).count()
    }

    fn lock_for(&self, name: &SafeName) -> Arc<RwLock<()>> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = map.get(name.as_str()).and_then(Weak::upgrade) {
            return lock;
        }
        map.retain(|_, w| w.strong_count() > 0);
        let lock = Arc::new(RwLock::new(()));
        map.insert(name.as_str().to_string(), Arc::downgrade(&lock));
        lock
    }
}
