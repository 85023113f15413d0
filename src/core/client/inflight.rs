//! Per-key locks that keep at most one fetch per cache key in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Cache key → lock, holding only keys with a fetch running or waiting.
#[derive(Debug, Default)]
pub(crate) struct InflightRegistry {
    slots: Mutex<HashMap<String, KeyLock>>,
}

impl InflightRegistry {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, KeyLock>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Joins the queue for `key`, creating its lock if nobody holds one.
    pub(crate) fn slot(&self, key: &str) -> Slot<'_> {
        let lock = self.slots().entry(key.to_string()).or_default().clone();
        Slot {
            registry: self,
            key: key.to_string(),
            lock,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots().len()
    }
}

/// A caller's place in the queue for one key.
///
/// The key's entry is removed when the last slot referring to it is dropped,
/// whether the fetch succeeded, failed, or the caller gave up waiting.
pub(crate) struct Slot<'a> {
    registry: &'a InflightRegistry,
    key: String,
    lock: KeyLock,
}

impl Slot<'_> {
    /// Waits until every earlier caller for this key is done.
    pub(crate) async fn acquire(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let mut slots = self.registry.slots();
        // Release our reference while holding the registry lock: clones are only
        // taken under it, so a count of one means only the map is left.
        drop(std::mem::take(&mut self.lock));
        if slots
            .get(&self.key)
            .is_some_and(|current| Arc::strong_count(current) == 1)
        {
            slots.remove(&self.key);
        }
    }
}
