use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{CacheFuture, KeyValueBackend};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// Thread-safe in-process key-value backend.
///
/// `get` returns a value until it is removed, even past its TTL hint;
/// [`TtlCacheStore`](super::TtlCacheStore) decides expiry and evicts. The hint
/// only drives [`MemoryBackend::clear_expired`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<tokio::sync::RwLock<HashMap<String, StoredValue>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove entries whose TTL hint has elapsed.
    pub async fn clear_expired(&self) {
        let now = Instant::now();
        self.inner
            .write()
            .await
            .retain(|_, stored| stored.expires_at > now);
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Number of stored values, including ones past their TTL hint.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
        Box::pin(async move {
            let map = self.inner.read().await;
            Ok(map.get(key).map(|stored| stored.value.clone()))
        })
    }

    fn put<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let expires_at = Instant::now()
                .checked_add(ttl)
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(365 * 24 * 60 * 60));
            self.inner
                .write()
                .await
                .insert(key.to_owned(), StoredValue { value, expires_at });
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            self.inner.write().await.remove(key);
            Ok(())
        })
    }
}
