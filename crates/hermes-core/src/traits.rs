use std::future::Future;

use crate::error::AppError;
use crate::models::ProviderMatch;

/// Resolves a query string against one geocoding backend.
///
/// `Ok(None)` means the backend answered cleanly with zero matches (or is
/// not configured); transport failures and non-2xx responses are returned
/// as errors so the retry executor and circuit breaker can act on them.
/// Implementations never retry on their own.
pub trait Geocoder: Send + Sync + Clone {
    /// Stable provider name used for logging, breaker identity, and result
    /// attribution.
    fn name(&self) -> &'static str;

    fn geocode(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<ProviderMatch>, AppError>> + Send;
}

/// A no-op Geocoder that never matches, for wiring a pipeline without any
/// backend.
#[derive(Debug, Clone)]
pub struct NullGeocoder;

impl Geocoder for NullGeocoder {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn geocode(&self, _query: &str) -> Result<Option<ProviderMatch>, AppError> {
        Ok(None)
    }
}
