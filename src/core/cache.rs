//! In-memory response cache with lazy and periodic expiry.

use crate::core::Response;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How often the background sweep purges expired entries by default.
pub const DEFAULT_EVICTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct CacheEntry {
    response: Response,
    /// `None` when the TTL reaches past what an `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

#[derive(Debug, Default)]
struct CacheStore {
    map: RwLock<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.map.write().await;
        let before = guard.len();
        guard.retain(|_, entry| !entry.is_expired(now));
        before - guard.len()
    }
}

/// Stops the sweep task once the last cache handle is gone.
#[derive(Debug)]
struct Sweeper {
    interval: Duration,
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// A key → response store with per-entry TTL.
///
/// Expired entries are never returned: [`get`](Self::get) removes an expired
/// entry it runs into, and a background task purges all expired entries every
/// eviction interval until [`stop_eviction`](Self::stop_eviction) is called or
/// the last clone of the cache is dropped. Clones share the same entries.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    store: Arc<CacheStore>,
    sweeper: Arc<Sweeper>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    /// Creates a cache swept every [`DEFAULT_EVICTION_INTERVAL`].
    pub fn new() -> Self {
        Self::with_eviction_interval(DEFAULT_EVICTION_INTERVAL)
    }

    /// Creates a cache swept every `interval`.
    ///
    /// The sweep runs on the current Tokio runtime. Outside a runtime no sweep
    /// is started and expired entries are only dropped when looked up.
    pub fn with_eviction_interval(interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let store = Arc::new(CacheStore::default());
        let stop = CancellationToken::new();

        let task = match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(sweep(
                Arc::downgrade(&store),
                interval,
                stop.clone(),
            ))),
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("no tokio runtime; cache eviction sweep not started");
                None
            }
        };

        let sweeper = Arc::new(Sweeper {
            interval,
            stop,
            task,
        });
        Self { store, sweeper }
    }

    /// Returns the response stored under `key`, unless absent or expired.
    pub async fn get(&self, key: &str) -> Option<Response> {
        let now = Instant::now();
        {
            let guard = self.store.map.read().await;
            match guard.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.response.clone()),
                Some(_) => {}
            }
        }

        let mut guard = self.store.map.write().await;
        if guard.get(key).is_some_and(|e| e.is_expired(now)) {
            guard.remove(key);
        }
        None
    }

    /// Stores `response` under `key` for `ttl`, replacing any previous entry.
    ///
    /// A TTL too large to be represented as a point in time keeps the entry
    /// until it is replaced.
    pub async fn set(&self, key: impl Into<String>, response: Response, ttl: Duration) {
        let entry = CacheEntry {
            response,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.store.map.write().await.insert(key.into(), entry);
    }

    /// Removes every expired entry now and returns how many were removed.
    pub async fn evict_expired(&self) -> usize {
        self.store.purge_expired().await
    }

    /// Number of stored entries, expired ones included until they are purged.
    pub async fn len(&self) -> usize {
        self.store.map.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Interval of the background sweep.
    pub fn eviction_interval(&self) -> Duration {
        self.sweeper.interval
    }

    /// Stops the background sweep. Lookups keep expiring entries lazily.
    pub fn stop_eviction(&self) {
        self.sweeper.stop.cancel();
    }

    /// Whether the background sweep task is still alive.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

async fn sweep(store: Weak<CacheStore>, every: Duration, stop: CancellationToken) {
    // An interval this long never elapses; park until stopped.
    let Some(start) = Instant::now().checked_add(every) else {
        stop.cancelled().await;
        return;
    };
    let mut ticker = tokio::time::interval_at(start, every);
    loop {
        tokio::select! {
            () = stop.cancelled() => return,
            _ = ticker.tick() => {
                let Some(store) = store.upgrade() else { return };
                let _purged = store.purge_expired().await;
                #[cfg(feature = "tracing")]
                if _purged > 0 {
                    tracing::debug!(purged = _purged, "evicted expired cache entries");
                }
            }
        }
    }
}
