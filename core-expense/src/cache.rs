//! Bounded LRU cache for read responses.
//!
//! Entries are keyed by request path including the query string and stored
//! as JSON values so one cache serves every response type.
//!
//! Every invalidation starts a new generation. A response fetched before an
//! invalidation is stored with [`QueryCache::put_if_current`] and dropped if
//! the generation moved while it was in flight.

use async_trait::async_trait;
use core_auth::SessionCache;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct QueryCache {
    /// `None` when created with zero capacity
    entries: Option<Mutex<LruCache<String, Value>>>,
    event_bus: EventBus,
    hits: AtomicU64,
    misses: AtomicU64,
    /// Bumped under the entries lock by every invalidation.
    generation: AtomicU64,
}

impl QueryCache {
    pub fn new(capacity: usize, event_bus: EventBus) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            event_bus,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Read before starting a fetch, then hand to
    /// [`put_if_current`](Self::put_if_current).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.entries.as_ref()?;
        let value = entries.lock().await.get(key).cloned();

        let Some(value) = value else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key, "Cache miss");
            return None;
        };

        match serde_json::from_value(value) {
            Ok(decoded) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key, "Cache hit");
                Some(decoded)
            }
            Err(e) => {
                warn!(key, error = %e, "Dropping cache entry of unexpected shape");
                entries.lock().await.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        let Some(entries) = self.entries.as_ref() else {
            return;
        };
        match serde_json::to_value(value) {
            Ok(json) => {
                entries.lock().await.put(key.to_string(), json);
            }
            Err(e) => warn!(key, error = %e, "Response not cacheable"),
        }
    }

    /// Store `value` unless the cache was invalidated since `generation` was
    /// read. Returns whether it was stored.
    pub async fn put_if_current<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        generation: u64,
    ) -> bool {
        let Some(entries) = self.entries.as_ref() else {
            return false;
        };
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "Response not cacheable");
                return false;
            }
        };

        let mut entries = entries.lock().await;
        if self.generation() != generation {
            debug!(key, "Cache invalidated during fetch, dropping response");
            return false;
        }
        entries.put(key.to_string(), json);
        true
    }

    /// Drop every entry whose key starts with one of `prefixes`.
    pub async fn invalidate_prefixes(&self, scope: &str, prefixes: &[&str]) -> usize {
        let Some(entries) = self.entries.as_ref() else {
            return 0;
        };

        let removed = {
            let mut entries = entries.lock().await;
            self.generation.fetch_add(1, Ordering::SeqCst);
            let stale: Vec<String> = entries
                .iter()
                .map(|(key, _)| key)
                .filter(|key| prefixes.iter().any(|p| key.starts_with(p)))
                .cloned()
                .collect();
            for key in &stale {
                entries.pop(key);
            }
            stale.len()
        };

        self.announce(scope, removed);
        removed
    }

    /// Drop everything.
    pub async fn invalidate_all(&self) -> usize {
        let removed = match self.entries.as_ref() {
            Some(entries) => {
                let mut entries = entries.lock().await;
                self.generation.fetch_add(1, Ordering::SeqCst);
                let count = entries.len();
                entries.clear();
                count
            }
            None => 0,
        };
        self.announce("all", removed);
        removed
    }

    pub async fn len(&self) -> usize {
        match self.entries.as_ref() {
            Some(entries) => entries.lock().await.len(),
            None => 0,
        }
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len().await,
        }
    }

    fn announce(&self, scope: &str, entries: usize) {
        debug!(scope, entries, "Cache invalidated");
        let _ = self.event_bus.emit(CoreEvent::Cache(CacheEvent::Invalidated {
            scope: scope.to_string(),
            entries,
        }));
    }
}

#[async_trait]
impl SessionCache for QueryCache {
    async fn clear(&self) {
        self.invalidate_all().await;
    }
}
