//! Short-lived query-result cache
//!
//! Deduplicates identical data fetches within a fixed window. One instance
//! per server, threaded through `AppState` rather than held as a global, so
//! tests get a fresh cache each. Entries are overwritten on refresh and
//! never evicted; key cardinality is bounded by the set of distinct queries.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct CacheEntry {
    content: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
}

#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key` if it is younger than `ttl`,
    /// otherwise run `producer` and store its output. A failing producer
    /// leaves the cache untouched, so the next call retries unconditionally.
    ///
    /// Concurrent misses for the same key each run their own producer
    /// (no in-flight coalescing); last writer wins.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.lookup::<T>(key, ttl) {
            tracing::debug!(key, "cache hit");
            return Ok(hit);
        }

        tracing::debug!(key, "cache miss");
        let content = Arc::new(producer().await?);
        self.store(key, content.clone());
        Ok(content)
    }

    /// Look up a live entry of the expected type. A stale entry, or one of a
    /// different type under the same key, counts as a miss.
    fn lookup<T: Send + Sync + 'static>(&self, key: &str, ttl: Duration) -> Option<Arc<T>> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() >= ttl {
            return None;
        }
        entry.content.clone().downcast::<T>().ok()
    }

    fn store<T: Send + Sync + 'static>(&self, key: &str, content: Arc<T>) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            CacheEntry {
                content,
                stored_at: Instant::now(),
            },
        );
    }
}

/// Build a cache key from an endpoint name and its parameters. Empty
/// components are kept so different queries never share a key by accident;
/// endpoints that want coarser sharing pass the same prefix and components.
pub fn cache_key(prefix: &str, components: &[&str]) -> String {
    let mut key = String::from(prefix);
    for c in components {
        key.push(':');
        key.push_str(c);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn producer_runs_once_within_ttl() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        for _ in 0..3 {
            let value = cache
                .get_or_compute("k", Duration::from_secs(60), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<i64, ()>(7)
                })
                .await
                .unwrap();
            assert_eq!(*value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn producer_runs_again_after_expiry() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let ttl = Duration::from_millis(20);

        for _ in 0..2 {
            cache
                .get_or_compute("k", ttl, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<i64, ()>(1)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;

        cache
            .get_or_compute("k", ttl, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<i64, ()>(1)
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_producer_writes_nothing() {
        let cache = QueryCache::new();

        let failed = cache
            .get_or_compute("k", Duration::from_secs(60), || async {
                Err::<i64, &str>("boom")
            })
            .await;
        assert!(failed.is_err());

        // The failure must not leave a poisoned entry behind
        let ok = cache
            .get_or_compute("k", Duration::from_secs(60), || async {
                Ok::<i64, &str>(5)
            })
            .await
            .unwrap();
        assert_eq!(*ok, 5);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_collide() {
        let cache = QueryCache::new();

        let a = cache
            .get_or_compute("a", Duration::from_secs(60), || async { Ok::<i64, ()>(1) })
            .await
            .unwrap();
        let b = cache
            .get_or_compute("b", Duration::from_secs(60), || async { Ok::<i64, ()>(2) })
            .await
            .unwrap();

        assert_eq!(*a, 1);
        assert_eq!(*b, 2);
    }

    #[test]
    fn cache_key_keeps_empty_components() {
        assert_eq!(cache_key("totals", &["", "", "live"]), "totals:::live");
        assert_ne!(
            cache_key("totals", &["US", ""]),
            cache_key("totals", &["", "US"])
        );
    }
}
