//! Time-bounded storage of prior live results.
//!
//! The layering mirrors the collaborator boundary:
//!
//! - [`KeyValueBackend`] is the external persistence capability (string
//!   values with a TTL hint). [`MemoryBackend`] and [`DuckDbBackend`] are
//!   the bundled implementations.
//! - [`TtlCacheStore`] is the [`CacheStore`] the orchestrator consumes. It
//!   owns the entry format and enforces expiry against an injected
//!   [`Clock`], so an entry is served only while `now < written_at + ttl`.
//!
//! Expired entries are indistinguishable from missing ones for callers that
//! only use [`CacheLookup::into_entry`]; the orchestrator looks at the
//! variant to report a precise skip reason.

mod duckdb;
mod memory;

pub use self::duckdb::DuckDbBackend;
pub use self::memory::MemoryBackend;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::{CacheError, CacheKey, RiskAssessment, UtcDateTime};

/// Boxed future returned by cache operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// Default lifetime of a cache entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Stored form of a successful live result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    key: CacheKey,
    assessment: RiskAssessment,
    written_at: UtcDateTime,
    ttl_ms: u64,
}

impl CacheEntry {
    /// Builds an entry for a live assessment.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotCacheable`] for cache-hit or synthetic results.
    pub fn new(
        key: CacheKey,
        assessment: RiskAssessment,
        written_at: UtcDateTime,
        ttl: Duration,
    ) -> Result<Self, CacheError> {
        if !assessment.source().is_live() {
            return Err(CacheError::NotCacheable {
                source_id: assessment.source(),
            });
        }
        Ok(Self {
            key,
            assessment,
            written_at,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        })
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// The assessment exactly as the live producer returned it.
    pub fn assessment(&self) -> &RiskAssessment {
        &self.assessment
    }

    pub const fn written_at(&self) -> UtcDateTime {
        self.written_at
    }

    pub const fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn expires_at(&self) -> UtcDateTime {
        self.written_at.saturating_add(self.ttl())
    }

    /// Exclusive expiry: an entry whose expiry instant equals `now` is stale.
    pub fn is_valid_at(&self, now: UtcDateTime) -> bool {
        now < self.expires_at()
    }

    /// Caller-facing form of this entry, tagged as a cache hit.
    pub fn served_assessment(&self) -> RiskAssessment {
        self.assessment.to_cached()
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CacheEntry),
    Expired,
    Empty,
}

impl CacheLookup {
    /// Collapses both miss kinds into `None`.
    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            Self::Hit(entry) => Some(entry),
            Self::Expired | Self::Empty => None,
        }
    }

    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// Cache contract consumed by the orchestrator.
///
/// Implementations must be safe for concurrent reads and writes; atomicity
/// is only required per key.
pub trait CacheStore: Send + Sync {
    fn lookup<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, CacheLookup>;

    /// Persists a live assessment under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotCacheable`] for non-live assessments, or a
    /// backend/serialization error if the write could not be completed.
    fn store<'a>(&'a self, key: &'a CacheKey, assessment: &'a RiskAssessment)
        -> CacheFuture<'a, ()>;
}

/// External key-value persistence with per-entry TTL hints.
pub trait KeyValueBackend: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

    fn put<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> CacheFuture<'a, ()>;

    fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()>;
}

/// [`CacheStore`] that serializes [`CacheEntry`] values as JSON into a
/// [`KeyValueBackend`].
#[derive(Clone)]
pub struct TtlCacheStore<B> {
    backend: B,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<B: KeyValueBackend> TtlCacheStore<B> {
    pub fn new(backend: B, ttl: Duration) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            ttl,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn lookup_entry(&self, key: &CacheKey) -> Result<CacheLookup, CacheError> {
        let storage_key = key.storage_key();
        let Some(raw) = self.backend.get(&storage_key).await? else {
            return Ok(CacheLookup::Empty);
        };

        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.key() == key => entry,
            _ => {
                self.backend.remove(&storage_key).await?;
                return Err(CacheError::Corrupt {
                    key: key.to_string(),
                });
            }
        };

        if entry.is_valid_at(self.clock.now()) {
            return Ok(CacheLookup::Hit(entry));
        }

        if let Err(error) = self.backend.remove(&storage_key).await {
            debug!(cache_key = %key, %error, "failed to evict expired cache entry");
        }
        Ok(CacheLookup::Expired)
    }

    async fn store_entry(
        &self,
        key: &CacheKey,
        assessment: &RiskAssessment,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry::new(key.clone(), assessment.clone(), self.clock.now(), self.ttl)?;
        let payload = serde_json::to_string(&entry)
            .map_err(|error| CacheError::Serialization(error.to_string()))?;
        self.backend.put(&key.storage_key(), payload, self.ttl).await
    }
}

impl<B: KeyValueBackend> CacheStore for TtlCacheStore<B> {
    fn lookup<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, CacheLookup> {
        Box::pin(self.lookup_entry(key))
    }

    fn store<'a>(
        &'a self,
        key: &'a CacheKey,
        assessment: &'a RiskAssessment,
    ) -> CacheFuture<'a, ()> {
        Box::pin(self.store_entry(key, assessment))
    }
}
