use std::sync::Arc;
use std::time::Duration;

use joebot_models::FetchResult;
use moka::future::Cache;

/// Memoized fetch results backed by moka.
///
/// The record store never changes after load, so entries cannot go stale;
/// the TTL only bounds memory.
#[derive(Clone)]
pub struct ResultCache {
    inner: Cache<String, Arc<FetchResult>>,
}

impl ResultCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<FetchResult>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, value: Arc<FetchResult>) {
        self.inner.insert(key, value).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Flush pending maintenance so `entry_count` is accurate.
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_get() {
        let cache = ResultCache::new(100, Duration::from_secs(60));
        cache
            .insert("count|[]".to_string(), Arc::new(FetchResult::count(3)))
            .await;

        let result = cache.get("count|[]").await;
        assert_eq!(result.map(|r| r.total_count), Some(3));
    }

    #[tokio::test]
    async fn get_missing() {
        let cache = ResultCache::new(100, Duration::from_secs(60));
        assert!(cache.get("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn ttl_expiration() {
        let cache = ResultCache::new(100, Duration::from_millis(50));
        cache
            .insert("key1".to_string(), Arc::new(FetchResult::count(1)))
            .await;

        assert!(cache.get("key1").await.is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.get("key1").await.is_none());
    }

    #[tokio::test]
    async fn entry_count_after_sync() {
        let cache = ResultCache::new(100, Duration::from_secs(60));
        cache
            .insert("a".to_string(), Arc::new(FetchResult::count(1)))
            .await;
        cache
            .insert("b".to_string(), Arc::new(FetchResult::count(2)))
            .await;
        cache.sync().await;
        assert_eq!(cache.entry_count(), 2);
    }
}
