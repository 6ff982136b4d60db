use std::sync::Arc;

use axum::Router;

use hermes_core::cache::{GeocodeCache, MemoryStore};
use hermes_core::geocode::GeocodeService;
use hermes_providers::Provider;
use hermes_server::routes;
use hermes_server::state::AppState;

/// Router over an empty provider cascade: every resolution is an instant
/// clean no-match, so no test touches the network.
pub fn setup_test_app() -> Router {
    let service = GeocodeService::<Provider, MemoryStore>::with_cache(
        Vec::new(),
        GeocodeCache::new(MemoryStore::default()),
    );
    routes::router(Arc::new(AppState { service }))
}
