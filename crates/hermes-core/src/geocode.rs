//! Single-address geocoding orchestration.
//!
//! [`GeocodeService`] drives the provider cascade for one address: cache
//! first, then each configured provider in strict priority order, each call
//! paced by that provider's token bucket, retried with exponential backoff,
//! and guarded by that provider's circuit breaker. The first provider to
//! produce a usable fix wins; there is no parallel fan-out across providers,
//! which preserves deterministic preference and avoids wasting quota.

use crate::cache::{CacheStore, GeocodeCache};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use crate::models::{AddressRecord, CountryFilter, GeocodeResult};
use crate::rate_limit::TokenBucket;
use crate::retry::{RetryConfig, with_backoff};
use crate::traits::Geocoder;

/// One provider in the cascade, with its own resilience state.
///
/// Bucket, breaker, and retry config are explicit instances owned by the
/// entry (shared via their internal `Arc`s when the entry is cloned), so
/// independent pipelines in one process never interfere.
#[derive(Clone, Debug)]
pub struct ProviderEntry<G: Geocoder> {
    geocoder: G,
    limiter: TokenBucket,
    breaker: CircuitBreaker,
    retry: RetryConfig,
}

impl<G: Geocoder> ProviderEntry<G> {
    /// Entry with a 5 req/s bucket and default breaker/retry settings.
    pub fn new(geocoder: G) -> Self {
        let breaker = CircuitBreaker::new(geocoder.name(), CircuitBreakerConfig::default());
        Self {
            geocoder,
            limiter: TokenBucket::new(5, 5.0),
            breaker,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_limiter(mut self, limiter: TokenBucket) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn name(&self) -> &'static str {
        self.geocoder.name()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn limiter(&self) -> &TokenBucket {
        &self.limiter
    }
}

/// Orchestrates the provider cascade for single addresses.
///
/// Generic over the provider capability and the cache store, enabling
/// dependency injection and testability without real HTTP calls.
#[derive(Clone)]
pub struct GeocodeService<G, S>
where
    G: Geocoder,
    S: CacheStore,
{
    providers: Vec<ProviderEntry<G>>,
    cache: Option<GeocodeCache<S>>,
    country: Option<CountryFilter>,
}

impl<G, S> GeocodeService<G, S>
where
    G: Geocoder,
    S: CacheStore,
{
    /// Create a new GeocodeService without a cache.
    pub fn new(providers: Vec<ProviderEntry<G>>) -> Self {
        Self {
            providers,
            cache: None,
            country: None,
        }
    }

    /// Create a new GeocodeService with a result cache.
    pub fn with_cache(providers: Vec<ProviderEntry<G>>, cache: GeocodeCache<S>) -> Self {
        Self {
            providers,
            cache: Some(cache),
            country: None,
        }
    }

    /// Restrict provider results to one country.
    pub fn with_country(mut self, country: CountryFilter) -> Self {
        self.country = Some(country);
        self
    }

    pub fn providers(&self) -> &[ProviderEntry<G>] {
        &self.providers
    }

    pub fn cache(&self) -> Option<&GeocodeCache<S>> {
        self.cache.as_ref()
    }

    /// Resolve one address record to a [`GeocodeResult`].
    ///
    /// Never fails the caller: validation failures, total provider
    /// exhaustion, and clean no-matches all come back as classified
    /// results. The distinction after exhaustion: `error` if and only if
    /// the last attempted provider raised (or was short-circuited by an
    /// open breaker), `no_match` otherwise.
    pub async fn resolve(&self, record: &AddressRecord) -> GeocodeResult {
        let query = record.query_string(self.country.as_ref());

        if let Err(err) = record.validate() {
            tracing::warn!(error = %err, "Rejected address record");
            return GeocodeResult::failed(record.clone(), query, err.to_string());
        }

        if let Some(cache) = &self.cache
            && let Some(hit) = cache.get(record)
        {
            return hit;
        }

        let mut last_error: Option<String> = None;
        let mut last_attempt_errored = false;

        for entry in &self.providers {
            tracing::debug!(provider = entry.name(), %query, "Trying provider");

            let outcome = entry
                .breaker
                .call(|| {
                    with_backoff(&entry.retry, || async {
                        entry.limiter.consume(1.0).await;
                        entry.geocoder.geocode(&query).await
                    })
                })
                .await;

            match outcome {
                Ok(Some(fix)) => {
                    if !fix.has_valid_coordinates() {
                        tracing::debug!(
                            provider = entry.name(),
                            "Provider returned a null position, treating as no match"
                        );
                        last_attempt_errored = false;
                        continue;
                    }

                    tracing::info!(
                        provider = entry.name(),
                        lat = fix.latitude,
                        lon = fix.longitude,
                        level = %fix.match_level,
                        "Geocoded"
                    );
                    let result = GeocodeResult::matched(record.clone(), fix, entry.name());
                    if let Some(cache) = &self.cache {
                        cache.put(&result);
                    }
                    return result;
                }
                Ok(None) => {
                    tracing::debug!(provider = entry.name(), "No match");
                    last_attempt_errored = false;
                }
                Err(CircuitBreakerError::Open { name, retry_after }) => {
                    tracing::debug!(
                        provider = %name,
                        retry_after_secs = retry_after.as_secs(),
                        "Skipping provider with open circuit"
                    );
                    last_error = Some(format!(
                        "provider '{}' unavailable (circuit open, retry in {}s)",
                        name,
                        retry_after.as_secs()
                    ));
                    last_attempt_errored = true;
                }
                Err(CircuitBreakerError::Inner(err)) => {
                    tracing::warn!(provider = entry.name(), error = %err, "Provider failed");
                    last_error = Some(err.to_string());
                    last_attempt_errored = true;
                }
            }
        }

        if last_attempt_errored && let Some(detail) = last_error {
            GeocodeResult::failed(record.clone(), query, detail)
        } else {
            GeocodeResult::no_match(record.clone(), query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::error::AppError;
    use crate::models::{MatchLevel, ProviderMatch};
    use crate::testutil::{MockGeocoder, make_test_fix, make_test_record};

    fn entry(geocoder: MockGeocoder) -> ProviderEntry<MockGeocoder> {
        // Generous bucket + single attempt keeps tests fast and counts exact.
        ProviderEntry::new(geocoder)
            .with_limiter(TokenBucket::new(100, 100.0))
            .with_retry(RetryConfig::none())
    }

    fn service(
        providers: Vec<ProviderEntry<MockGeocoder>>,
    ) -> GeocodeService<MockGeocoder, MemoryStore> {
        GeocodeService::new(providers)
    }

    #[tokio::test]
    async fn first_provider_match_wins() {
        let first = MockGeocoder::with_match(make_test_fix()).with_name("first");
        let second = MockGeocoder::with_match(make_test_fix()).with_name("second");
        let svc = service(vec![entry(first.clone()), entry(second.clone())]);

        let result = svc.resolve(&make_test_record(1)).await;

        assert!(result.success);
        assert_eq!(result.source_provider.as_deref(), Some("first"));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn falls_through_on_no_match() {
        let first = MockGeocoder::never_matches().with_name("first");
        let second = MockGeocoder::with_match(make_test_fix()).with_name("second");
        let svc = service(vec![entry(first.clone()), entry(second.clone())]);

        let result = svc.resolve(&make_test_record(1)).await;

        assert!(result.success);
        assert_eq!(result.source_provider.as_deref(), Some("second"));
        assert_eq!(first.calls(), 1);
    }

    #[tokio::test]
    async fn falls_through_on_provider_error() {
        let first = MockGeocoder::with_responses(vec![Err(AppError::NetworkError(
            "connection refused".into(),
        ))])
        .with_name("first");
        let second = MockGeocoder::with_match(make_test_fix()).with_name("second");
        let svc = service(vec![entry(first), entry(second)]);

        let result = svc.resolve(&make_test_record(1)).await;

        assert!(result.success);
        assert_eq!(result.source_provider.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn all_no_match_yields_no_match() {
        let svc = service(vec![
            entry(MockGeocoder::never_matches()),
            entry(MockGeocoder::never_matches()),
        ]);

        let result = svc.resolve(&make_test_record(1)).await;

        assert!(!result.success);
        assert_eq!(result.match_level, MatchLevel::NoMatch);
        assert!(result.error_detail.is_none());
    }

    #[tokio::test]
    async fn error_on_last_provider_yields_error_result() {
        let svc = service(vec![
            entry(MockGeocoder::never_matches()),
            entry(MockGeocoder::with_responses(vec![Err(
                AppError::NetworkError("host unreachable".into()),
            )])),
        ]);

        let result = svc.resolve(&make_test_record(1)).await;

        assert!(!result.success);
        assert_eq!(result.match_level, MatchLevel::Error);
        assert!(
            result
                .error_detail
                .as_deref()
                .unwrap()
                .contains("host unreachable")
        );
    }

    #[tokio::test]
    async fn earlier_error_with_clean_last_answer_yields_no_match() {
        let svc = service(vec![
            entry(MockGeocoder::with_responses(vec![Err(
                AppError::NetworkError("boom".into()),
            )])),
            entry(MockGeocoder::never_matches()),
        ]);

        let result = svc.resolve(&make_test_record(1)).await;

        assert_eq!(result.match_level, MatchLevel::NoMatch);
        assert!(result.error_detail.is_none());
    }

    #[tokio::test]
    async fn no_providers_yields_no_match() {
        let svc = service(vec![]);
        let result = svc.resolve(&make_test_record(1)).await;
        assert_eq!(result.match_level, MatchLevel::NoMatch);
    }

    #[tokio::test]
    async fn cache_hit_skips_providers() {
        let provider = MockGeocoder::with_match(make_test_fix());
        let svc = GeocodeService::with_cache(
            vec![entry(provider.clone())],
            GeocodeCache::new(MemoryStore::default()),
        );

        let record = make_test_record(1);
        let first = svc.resolve(&record).await;
        let second = svc.resolve(&record).await;

        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn failed_resolution_is_not_cached() {
        let provider = MockGeocoder::never_matches();
        let svc = GeocodeService::with_cache(
            vec![entry(provider.clone())],
            GeocodeCache::new(MemoryStore::default()),
        );

        let record = make_test_record(1);
        svc.resolve(&record).await;
        svc.resolve(&record).await;

        // No-match outcomes are retried, not served from cache.
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn invalid_record_never_reaches_providers() {
        let provider = MockGeocoder::with_match(make_test_fix());
        let svc = service(vec![entry(provider.clone())]);

        let result = svc.resolve(&AddressRecord::default()).await;

        assert_eq!(result.match_level, MatchLevel::Error);
        assert!(result.error_detail.is_some());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn null_position_is_treated_as_no_match() {
        let fix = ProviderMatch {
            latitude: 0.0,
            longitude: 0.0,
            display_name: "origin".into(),
            match_level: MatchLevel::Approximate,
        };
        let svc = service(vec![entry(MockGeocoder::with_match(fix))]);

        let result = svc.resolve(&make_test_record(1)).await;

        assert!(!result.success);
        assert_eq!(result.match_level, MatchLevel::NoMatch);
    }

    #[tokio::test]
    async fn open_breaker_skips_provider_without_invoking() {
        let failing = MockGeocoder::with_match(make_test_fix()).with_name("broken");
        let breaker = CircuitBreaker::new(
            "broken",
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        );
        breaker.record_failure(&AppError::NetworkError("down".into()));

        let fallback = MockGeocoder::with_match(make_test_fix()).with_name("fallback");
        let svc = service(vec![
            entry(failing.clone()).with_breaker(breaker),
            entry(fallback.clone()),
        ]);

        let result = svc.resolve(&make_test_record(1)).await;

        assert!(result.success);
        assert_eq!(result.source_provider.as_deref(), Some("fallback"));
        assert_eq!(failing.calls(), 0);
    }

    #[tokio::test]
    async fn retry_recovers_transient_provider_failure() {
        let flaky = MockGeocoder::with_responses(vec![
            Err(AppError::NetworkError("reset".into())),
            Ok(Some(make_test_fix())),
        ]);
        let svc = service(vec![
            ProviderEntry::new(flaky.clone())
                .with_limiter(TokenBucket::new(100, 100.0))
                .with_retry(
                    RetryConfig::default()
                        .with_max_attempts(3)
                        .with_initial_delay(std::time::Duration::from_millis(1)),
                ),
        ]);

        let result = svc.resolve(&make_test_record(1)).await;

        assert!(result.success);
        assert_eq!(flaky.calls(), 2);
    }
}
