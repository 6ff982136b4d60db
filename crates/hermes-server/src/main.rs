use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use hermes_core::cache::{GeocodeCache, MemoryStore};
use hermes_core::geocode::GeocodeService;
use hermes_core::models::CountryFilter;
use hermes_providers::{ProviderCredentials, configured_providers};
use hermes_server::routes;
use hermes_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hermes=info".parse()?))
        .with_target(false)
        .init();

    let port = std::env::var("HERMES_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let country = match std::env::var("HERMES_COUNTRY") {
        Ok(raw) => Some(raw.parse::<CountryFilter>().map_err(anyhow::Error::msg)?),
        Err(_) => None,
    };

    let credentials = ProviderCredentials::from_env();
    if credentials.is_empty() {
        tracing::warn!("No provider API keys configured; only Nominatim will be used");
    }
    let providers = configured_providers(&credentials, country.as_ref())?;

    let mut service =
        GeocodeService::with_cache(providers, GeocodeCache::new(MemoryStore::default()));
    if let Some(country) = country {
        service = service.with_country(country);
    }

    let state = Arc::new(AppState { service });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    tracing::info!("Shutdown signal received");
}
