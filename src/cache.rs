use crate::{config::Config, errors::LookupError};
use async_trait::async_trait;
use moka::{future::Cache, Expiry};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};
use tracing::debug;

pub const BOOTSTRAP_SERVICES_KEY: &str = "bootstrap:services";
pub const BOOTSTRAP_PSL_KEY: &str = "bootstrap:psl";

/// A key as returned by [`KvStore::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvKey {
    pub name: String,
    pub expiration: Option<SystemTime>,
}

/// Opaque key-value persistence with TTL-expiring entries.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, LookupError>;
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), LookupError>;
    async fn delete(&self, key: &str) -> Result<(), LookupError>;
    async fn list(&self, prefix: &str) -> Result<Vec<KvKey>, LookupError>;
}

#[derive(Clone)]
struct StoredValue {
    value: Arc<str>,
    ttl: Option<Duration>,
    expires_at: Option<SystemTime>,
}

struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &StoredValue, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-process [`KvStore`] on top of moka
pub struct MemoryStore {
    cache: Cache<String, StoredValue>,
}

impl MemoryStore {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, LookupError> {
        Ok(self.cache.get(key).await.map(|stored| stored.value.to_string()))
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), LookupError> {
        let stored = StoredValue {
            value: Arc::from(value),
            ttl,
            expires_at: ttl.map(|ttl| SystemTime::now() + ttl),
        };
        self.cache.insert(key.to_string(), stored).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), LookupError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KvKey>, LookupError> {
        let mut keys: Vec<KvKey> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, stored)| KvKey {
                name: key.to_string(),
                expiration: stored.expires_at,
            })
            .collect();
        keys.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(keys)
    }
}

/// JSON-typed access to the key-value store
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn KvStore>,
    result_ttl: Duration,
}

impl CacheService {
    pub fn new(config: Arc<Config>) -> Self {
        let store = Arc::new(MemoryStore::new(config.cache_max_entries));
        Self::with_store(store, Duration::from_secs(config.cache_ttl_seconds))
    }

    pub fn with_store(store: Arc<dyn KvStore>, result_ttl: Duration) -> Self {
        Self { store, result_ttl }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn result_ttl(&self) -> Duration {
        self.result_ttl
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, LookupError> {
        match self.store.get(key).await? {
            Some(raw) => {
                debug!("Cache hit for key: {}", key);
                let value = serde_json::from_str(&raw)
                    .map_err(|e| LookupError::CacheError(format!("Corrupt cache entry {}: {}", key, e)))?;
                Ok(Some(value))
            }
            None => {
                debug!("Cache miss for key: {}", key);
                Ok(None)
            }
        }
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), LookupError> {
        let raw = serde_json::to_string(value)?;
        self.store.put(key, raw, Some(ttl)).await?;
        debug!("Cached value for key: {} (ttl {}s)", key, ttl.as_secs());
        Ok(())
    }

    pub async fn get_text(&self, key: &str) -> Result<Option<String>, LookupError> {
        self.store.get(key).await
    }

    pub async fn put_text(&self, key: &str, value: String, ttl: Duration) -> Result<(), LookupError> {
        self.store.put(key, value, Some(ttl)).await
    }

    /// Number of cached lookup results (bootstrap entries excluded)
    pub async fn cached_results(&self) -> Result<usize, LookupError> {
        Ok(self.store.list("rdap:").await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
    }

    #[tokio::test]
    async fn test_json_roundtrip_and_listing() {
        let cache = CacheService::with_store(Arc::new(MemoryStore::new(100)), Duration::from_secs(60));
        let sample = Sample { name: "example".into() };

        cache.put_json("rdap:domain:example.com", &sample, Duration::from_secs(60)).await.unwrap();
        cache.put_text(BOOTSTRAP_PSL_KEY, "com".into(), Duration::from_secs(60)).await.unwrap();

        let loaded: Option<Sample> = cache.get_json("rdap:domain:example.com").await.unwrap();
        assert_eq!(loaded, Some(sample));
        assert_eq!(cache.cached_results().await.unwrap(), 1);

        let keys = cache.store().list("").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.expiration.is_some()));
    }

    #[tokio::test]
    async fn test_entries_expire_individually() {
        let store = MemoryStore::new(100);
        store.put("short", "a".into(), Some(Duration::from_millis(50))).await.unwrap();
        store.put("long", "b".into(), Some(Duration::from_secs(60))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap(), Some("b".to_string()));
    }

    #[test]
    fn test_delete_and_corrupt_entry() {
        tokio_test::block_on(async {
            let cache = CacheService::with_store(Arc::new(MemoryStore::new(10)), Duration::from_secs(60));
            cache.put_text("rdap:ip:1.1.1.1", "not json".into(), Duration::from_secs(60)).await.unwrap();

            let result: Result<Option<Sample>, _> = cache.get_json("rdap:ip:1.1.1.1").await;
            assert!(matches!(result, Err(LookupError::CacheError(_))));

            cache.store().delete("rdap:ip:1.1.1.1").await.unwrap();
            assert_eq!(cache.get_text("rdap:ip:1.1.1.1").await.unwrap(), None);
        });
    }
}
