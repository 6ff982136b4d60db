use hermes_core::cache::MemoryStore;
use hermes_core::geocode::GeocodeService;
use hermes_providers::Provider;

/// Shared application state, available to all route handlers via
/// `State<Arc<AppState>>`.
///
/// One `GeocodeService` (and its cache, buckets, and breakers) is shared
/// across every request, so the per-provider pacing holds server-wide.
pub struct AppState {
    pub service: GeocodeService<Provider, MemoryStore>,
}
