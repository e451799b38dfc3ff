//! Read-through query cache
//!
//! Keyed by a descriptive tuple (source, contract, method, args...). Values
//! are type-erased; a lookup with the wrong type is treated as a miss.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Extend with call arguments
    pub fn with(mut self, part: impl Into<String>) -> Self {
        self.0.push(part.into());
        self
    }

    /// True if `prefix` matches the leading parts of this key
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
}

/// Shared between every query of a dashboard
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<RwLock<HashMap<QueryKey, CacheEntry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value if present, of type `T`, and younger than `stale_after`
    pub async fn get<T>(&self, key: &QueryKey, stale_after: Duration) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;

        if entry.fetched_at.elapsed() >= stale_after {
            trace!("Cache stale: {}", key);
            return None;
        }

        let value = entry.value.downcast_ref::<T>()?;
        trace!("Cache hit: {}", key);
        Some(value.clone())
    }

    pub async fn insert<T>(&self, key: QueryKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                value: Arc::new(value),
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop every entry under `prefix`; returns how many were removed
    pub async fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
