use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use hermes_core::error::AppError;
use hermes_core::models::{AddressRecord, MAX_QUERY_LEN};

use crate::dto::{
    BatchGeocodeRequest, BatchGeocodeResponse, GeocodeRequest, GeocodeResponse, HealthResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Server-side ceiling on addresses per batch call.
pub const MAX_BATCH_ADDRESSES: usize = 50;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/geocode", post(geocode))
        .route("/v1/geocode/batch", post(geocode_batch))
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

fn validate_address(address: &str) -> Result<&str, AppError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(AppError::ValidationError("address must not be empty".into()));
    }
    if address.len() > MAX_QUERY_LEN {
        return Err(AppError::ValidationError(format!(
            "address too long ({} chars, max {MAX_QUERY_LEN})",
            address.len()
        )));
    }
    Ok(address)
}

// ---------------------------------------------------------------------------
// Geocode
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/geocode",
    request_body = GeocodeRequest,
    responses(
        (status = 200, description = "Geocoding outcome (including no-match)", body = GeocodeResponse),
        (status = 400, description = "Empty or oversized address", body = crate::dto::ErrorResponse),
    ),
    tag = "geocode"
)]
pub async fn geocode(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<GeocodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let address = validate_address(&body.address)?;

    let record = AddressRecord::from_query(address);
    let result = state.service.resolve(&record).await;

    Ok(axum::Json(GeocodeResponse::from(result)))
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/geocode/batch",
    request_body = BatchGeocodeRequest,
    responses(
        (status = 200, description = "Per-address outcomes for the processed slice", body = BatchGeocodeResponse),
    ),
    tag = "geocode"
)]
pub async fn geocode_batch(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<BatchGeocodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let total = body.addresses.len();
    let limit = body
        .max_results
        .unwrap_or(MAX_BATCH_ADDRESSES)
        .min(MAX_BATCH_ADDRESSES);

    tracing::info!(total, limit, "Batch geocode request");

    // Sequential on purpose: every provider call goes through the shared
    // token buckets, which is where the inter-request pacing lives.
    let mut results = Vec::with_capacity(total.min(limit));
    for address in body.addresses.iter().take(limit) {
        let response = match validate_address(address) {
            Ok(address) => {
                let record = AddressRecord::from_query(address);
                GeocodeResponse::from(state.service.resolve(&record).await)
            }
            Err(err) => GeocodeResponse {
                success: false,
                lat: 0.0,
                lon: 0.0,
                display_name: address.clone(),
                match_level: "error".to_string(),
                source_provider: None,
                error_detail: Some(err.to_string()),
            },
        };
        results.push(response);
    }

    Ok(axum::Json(BatchGeocodeResponse {
        processed: results.len(),
        total,
        results,
    }))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health", body = HealthResponse)),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy",
        providers: state.service.providers().len(),
    })
}
