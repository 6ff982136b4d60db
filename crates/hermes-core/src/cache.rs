//! Content-addressed geocoding result cache.
//!
//! Keys are SHA-256 digests of the normalized address (see
//! [`AddressRecord::normalized`]), so lookups are deterministic across
//! whitespace/case variations and raw addresses never appear as storage
//! keys. Entries carry a schema version and creation timestamp; a version
//! mismatch or expired TTL is treated as a miss and the stale entry is
//! deleted on read. Only successful results with real coordinates are ever
//! stored — failures and no-matches are always retried on later runs.
//!
//! The persistence medium is an injected [`CacheStore`]; [`MemoryStore`] is
//! the in-process implementation.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AddressRecord, GeocodeResult, compute_hash};

/// Bump to invalidate every previously cached result on read.
pub const CACHE_SCHEMA_VERSION: &str = "2";

/// Default entry lifetime: 90 days.
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 90;

/// A stored geocoding result with its invalidation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub result: GeocodeResult,
    pub created_at: DateTime<Utc>,
    pub schema_version: String,
}

/// Key-value collaborator persisting cache entries.
///
/// Implementations must serialize individual key operations; no multi-key
/// transactions are required since each address is cached independently.
pub trait CacheStore: Send + Sync + Clone {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn put(&self, key: &str, entry: CacheEntry);
    fn remove(&self, key: &str);
    fn clear(&self);
    /// Snapshot of stored keys, for maintenance sweeps.
    fn keys(&self) -> Vec<String>;
}

/// In-process store backed by a moka cache.
#[derive(Clone)]
pub struct MemoryStore {
    inner: moka::sync::Cache<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: moka::sync::Cache::new(max_capacity),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, entry: CacheEntry) {
        self.inner.insert(key.to_string(), entry);
    }

    fn remove(&self, key: &str) {
        self.inner.invalidate(key);
    }

    fn clear(&self) {
        self.inner.invalidate_all();
    }

    fn keys(&self) -> Vec<String> {
        // Flush moka's write buffers so the iterator sees recent inserts.
        self.inner.run_pending_tasks();
        self.inner.iter().map(|(k, _)| (*k).clone()).collect()
    }
}

/// TTL + schema-version aware cache front for geocoding results.
#[derive(Clone)]
pub struct GeocodeCache<S: CacheStore> {
    store: S,
    ttl: TimeDelta,
}

impl<S: CacheStore> GeocodeCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ttl: TimeDelta::days(DEFAULT_CACHE_TTL_DAYS),
        }
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    fn key_for(record: &AddressRecord) -> String {
        compute_hash(&record.normalized())
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        entry.schema_version == CACHE_SCHEMA_VERSION && Utc::now() - entry.created_at <= self.ttl
    }

    /// Look up a previously cached result. Stale entries (TTL or schema
    /// version) are removed and reported as a miss.
    pub fn get(&self, record: &AddressRecord) -> Option<GeocodeResult> {
        let key = Self::key_for(record);
        let entry = self.store.get(&key)?;

        if !self.is_fresh(&entry) {
            tracing::debug!(%key, "Evicting stale cache entry");
            self.store.remove(&key);
            return None;
        }

        tracing::debug!(%key, "Cache hit");
        Some(entry.result)
    }

    /// Store a result. No-op unless it is successful with real coordinates.
    pub fn put(&self, result: &GeocodeResult) {
        if !result.success || (result.latitude == 0.0 && result.longitude == 0.0) {
            return;
        }

        let key = Self::key_for(&result.record);
        tracing::debug!(%key, "Cache store");
        self.store.put(
            &key,
            CacheEntry {
                result: result.clone(),
                created_at: Utc::now(),
                schema_version: CACHE_SCHEMA_VERSION.to_string(),
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Sweep out expired and version-mismatched entries. Returns the number
    /// removed. Lazy eviction on read makes this optional maintenance.
    pub fn prune(&self) -> usize {
        let mut removed = 0;
        for key in self.store.keys() {
            if let Some(entry) = self.store.get(&key)
                && !self.is_fresh(&entry)
            {
                self.store.remove(&key);
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Pruned stale cache entries");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchLevel, ProviderMatch};

    fn record() -> AddressRecord {
        AddressRecord {
            street: Some("Rua A".into()),
            number: Some("10".into()),
            city: Some("Maceió".into()),
            region: Some("AL".into()),
            postal_code: Some("57000-000".into()),
            ..AddressRecord::default()
        }
    }

    fn success_result(record: AddressRecord) -> GeocodeResult {
        GeocodeResult::matched(
            record,
            ProviderMatch {
                latitude: -9.66,
                longitude: -35.73,
                display_name: "Rua A, 10, Maceió - AL".into(),
                match_level: MatchLevel::Exact,
            },
            "here",
        )
    }

    fn cache() -> GeocodeCache<MemoryStore> {
        GeocodeCache::new(MemoryStore::default())
    }

    #[test]
    fn set_then_get_returns_identical_result() {
        let cache = cache();
        let result = success_result(record());

        cache.put(&result);
        assert_eq!(cache.get(&record()), Some(result));
    }

    #[test]
    fn lookup_is_insensitive_to_case_and_whitespace() {
        let cache = cache();
        cache.put(&success_result(record()));

        let mut noisy = record();
        noisy.street = Some("  RUA A ".into());
        noisy.postal_code = Some("57.000-000".into());

        assert!(cache.get(&noisy).is_some());
    }

    #[test]
    fn failed_results_are_never_cached() {
        let cache = cache();
        cache.put(&GeocodeResult::no_match(record(), "Rua A, 10"));
        cache.put(&GeocodeResult::failed(record(), "Rua A, 10", "boom"));

        assert!(cache.get(&record()).is_none());
    }

    #[test]
    fn expired_entry_is_a_miss_and_gets_removed() {
        let store = MemoryStore::default();
        let cache = GeocodeCache::new(store.clone());
        let result = success_result(record());

        // Plant an entry created beyond the TTL.
        store.put(
            &compute_hash(&record().normalized()),
            CacheEntry {
                result,
                created_at: Utc::now() - TimeDelta::days(DEFAULT_CACHE_TTL_DAYS + 1),
                schema_version: CACHE_SCHEMA_VERSION.to_string(),
            },
        );

        assert!(cache.get(&record()).is_none());
        assert!(store.keys().is_empty());
    }

    #[test]
    fn schema_version_mismatch_is_a_miss() {
        let store = MemoryStore::default();
        let cache = GeocodeCache::new(store.clone());

        store.put(
            &compute_hash(&record().normalized()),
            CacheEntry {
                result: success_result(record()),
                created_at: Utc::now(),
                schema_version: "1".to_string(),
            },
        );

        assert!(cache.get(&record()).is_none());
    }

    #[test]
    fn prune_removes_only_stale_entries() {
        let store = MemoryStore::default();
        let cache = GeocodeCache::new(store.clone());

        cache.put(&success_result(record()));

        let mut other = record();
        other.street = Some("Rua B".into());
        store.put(
            &compute_hash(&other.normalized()),
            CacheEntry {
                result: success_result(other),
                created_at: Utc::now() - TimeDelta::days(DEFAULT_CACHE_TTL_DAYS + 30),
                schema_version: CACHE_SCHEMA_VERSION.to_string(),
            },
        );

        assert_eq!(cache.prune(), 1);
        assert!(cache.get(&record()).is_some());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = cache();
        cache.put(&success_result(record()));
        cache.clear();
        assert!(cache.get(&record()).is_none());
    }
}
