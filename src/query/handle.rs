//! Query handles
//!
//! A `Query<T>` owns one fetch function, its latest status snapshot, and an
//! optional shared cache. Transport errors are retried a fixed number of
//! times with a fixed delay before the query reports `Error`.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use super::cache::{QueryCache, QueryKey};
use super::result::{QueryError, QueryResult, QueryStatus};

/// Fixed-count retry on transport errors
pub const DEFAULT_QUERY_RETRIES: u32 = 3;
pub const DEFAULT_QUERY_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub stale_time: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            retries: DEFAULT_QUERY_RETRIES,
            retry_delay: DEFAULT_QUERY_RETRY_DELAY,
        }
    }
}

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, eyre::Result<T>> + Send + Sync>;

pub struct Query<T> {
    key: QueryKey,
    fetcher: Fetcher<T>,
    state: Arc<RwLock<QueryResult<T>>>,
    cache: Option<QueryCache>,
    options: QueryOptions,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetcher: self.fetcher.clone(),
            state: self.state.clone(),
            cache: self.cache.clone(),
            options: self.options,
        }
    }
}

impl<T> Query<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(key: QueryKey, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<T>> + Send + 'static,
    {
        Self {
            key,
            fetcher: Arc::new(move || fetch().boxed()),
            state: Arc::new(RwLock::new(QueryResult::idle())),
            cache: None,
            options: QueryOptions::default(),
        }
    }

    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Current snapshot
    pub fn state(&self) -> QueryResult<T> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_state(&self, next: QueryResult<T>) {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = next;
    }

    /// Read-through: serve a fresh cached value, otherwise fetch
    pub async fn fetch(&self) -> QueryResult<T> {
        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get::<T>(&self.key, self.options.stale_time).await {
                self.set_state(QueryResult::success(value));
                return self.state();
            }
        }

        // Ignore the error here, it is already recorded in the snapshot
        let _ = self.refetch().await;
        self.state()
    }

    /// Bypass the cache and fetch again
    pub async fn refetch(&self) -> Result<T, QueryError> {
        {
            let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            if state.data.is_some() {
                state.is_fetching = true;
            } else {
                *state = QueryResult::loading();
            }
        }

        let mut attempt = 0;
        let result = loop {
            match (self.fetcher)().await {
                Ok(value) => break Ok(value),
                Err(e) if attempt < self.options.retries => {
                    attempt += 1;
                    debug!("{}: attempt {} failed ({}), retrying", self.key, attempt, e);
                    tokio::time::sleep(self.options.retry_delay).await;
                }
                Err(e) => break Err(QueryError::from(e)),
            }
        };

        match result {
            Ok(value) => {
                if let Some(cache) = &self.cache {
                    cache.insert(self.key.clone(), value.clone()).await;
                }
                self.set_state(QueryResult::success(value.clone()));
                Ok(value)
            }
            Err(error) => {
                warn!("{}: giving up after {} retries: {}", self.key, attempt, error);
                self.set_state(QueryResult {
                    status: QueryStatus::Error,
                    data: None,
                    error: Some(error.clone()),
                    is_fetching: false,
                });
                Err(error)
            }
        }
    }

}

/// Type-erased refetch, so heterogeneous queries can be refreshed together
pub trait Refetch: Send + Sync {
    fn key(&self) -> &QueryKey;

    fn refetch_erased(&self) -> BoxFuture<'_, Result<(), QueryError>>;
}

impl<T> Refetch for Query<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn key(&self) -> &QueryKey {
        &self.key
    }

    fn refetch_erased(&self) -> BoxFuture<'_, Result<(), QueryError>> {
        async move { self.refetch().await.map(|_| ()) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_delay(retries: u32) -> QueryOptions {
        QueryOptions {
            stale_time: Duration::from_secs(60),
            retries,
            retry_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_query_starts_idle_then_succeeds() {
        let query = Query::new(QueryKey::new(["test", "ok"]), || async { Ok(7u64) });
        assert!(query.state().is_idle());

        let result = query.fetch().await;
        assert!(result.is_success());
        assert_eq!(result.data, Some(7));
    }

    #[tokio::test]
    async fn test_query_retries_fixed_count() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let query = Query::new(QueryKey::new(["test", "flaky"]), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u64, _>(eyre::eyre!("node unavailable"))
            }
        })
        .with_options(no_delay(2));

        let result = query.fetch().await;

        assert!(result.is_error());
        assert!(result.data.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(result.error.unwrap().to_string().contains("node unavailable"));
    }

    #[tokio::test]
    async fn test_cached_value_skips_fetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let cache = QueryCache::new();
        let make = |cache: QueryCache| {
            let counter = counter.clone();
            Query::new(QueryKey::new(["test", "cached"]), move || {
                let counter = counter.clone();
                async move { Ok(counter.fetch_add(1, Ordering::SeqCst)) }
            })
            .with_cache(cache)
            .with_options(no_delay(0))
        };

        let first = make(cache.clone());
        let second = make(cache.clone());

        assert_eq!(first.fetch().await.data, Some(0));
        assert_eq!(second.fetch().await.data, Some(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // refetch bypasses the cache and overwrites it
        assert_eq!(second.refetch().await.unwrap(), 1);
        assert_eq!(first.fetch().await.data, Some(1));
    }
}
