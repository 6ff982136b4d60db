use serde::{Deserialize, Serialize};

use hermes_core::models::GeocodeResult;

// ---------------------------------------------------------------------------
// Geocode
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct GeocodeRequest {
    /// Preformatted address line to resolve
    pub address: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct GeocodeResponse {
    pub success: bool,
    pub lat: f64,
    pub lon: f64,
    pub display_name: String,
    pub match_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl From<GeocodeResult> for GeocodeResponse {
    fn from(result: GeocodeResult) -> Self {
        Self {
            success: result.success,
            lat: result.latitude,
            lon: result.longitude,
            display_name: result.display_name,
            match_level: result.match_level.to_string(),
            source_provider: result.source_provider,
            error_detail: result.error_detail,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BatchGeocodeRequest {
    pub addresses: Vec<String>,
    /// Cap on how many of `addresses` are processed (server enforces its
    /// own ceiling on top)
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BatchGeocodeResponse {
    /// How many addresses were actually processed this call
    pub processed: usize,
    /// How many were submitted
    pub total: usize,
    pub results: Vec<GeocodeResponse>,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Providers configured in the cascade
    pub providers: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
