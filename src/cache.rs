//! Ephemeral per-key cache for fetched source collections.
//!
//! Entries are valid for a fixed TTL after their last write. Nothing is ever
//! swept; an expired entry is simply ignored on read and overwritten by the
//! next `set`. The cache is the only shared mutable state in the engine.

use chrono::{DateTime, Duration, Utc};
use std::{any::Any, collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::trace;

/// Default time-to-live of a cache entry.
pub const DEFAULT_TTL: Duration = Duration::seconds(60);

type Payload = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Entry {
    payload: Payload,
    stored_at: DateTime<Utc>,
}

/// Time-boxed memoization keyed by string.
///
/// Payloads are opaque to the cache; `get` hands back a clone of the stored
/// value when the requested type matches and the entry is fresh.
#[derive(Clone)]
pub struct TtlCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl TtlCache {
    /// Empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Lifetime of an entry.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores `payload` under `key` with the current timestamp and returns it.
    pub async fn set<T>(&self, key: &str, payload: T) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        self.set_at(key, payload, Utc::now()).await
    }

    /// Returns the payload under `key` if present, fresh, and of type `T`.
    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get_at(key, Utc::now()).await
    }

    /// `set` with an explicit timestamp.
    pub async fn set_at<T>(&self, key: &str, payload: T, now: DateTime<Utc>) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        let entry = Entry {
            payload: Arc::new(payload.clone()),
            stored_at: now,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        trace!(key, "cache entry stored");
        payload
    }

    /// `get` evaluated at an explicit instant.
    pub async fn get_at<T>(&self, key: &str, now: DateTime<Utc>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entry = self.entries.read().await.get(key).cloned()?;
        if now - entry.stored_at >= self.ttl {
            trace!(key, "cache entry expired");
            return None;
        }
        entry.payload.downcast_ref::<T>().cloned()
    }

    /// Drops a single key, e.g. after a mutation of that collection.
    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Drops everything (period change or forced reload).
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let dropped = entries.len();
        entries.clear();
        trace!(dropped, "cache cleared");
    }
}
