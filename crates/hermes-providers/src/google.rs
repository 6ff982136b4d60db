//! Google Maps Geocoding API adapter.
//!
//! Unlike the other backends, Google signals errors inside a 200 body via
//! the `status` field, so the adapter re-maps those onto the error taxonomy
//! (`OVER_QUERY_LIMIT` behaves like a 429).

use hermes_core::error::AppError;
use hermes_core::models::{CountryFilter, MatchLevel, ProviderMatch};
use hermes_core::traits::Geocoder;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::http::{body_error, check_status, map_send_error};

const GOOGLE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Clone, Debug)]
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
    country: Option<CountryFilter>,
}

impl GoogleGeocoder {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            country: None,
        }
    }

    pub fn with_country(mut self, country: CountryFilter) -> Self {
        self.country = Some(country);
        self
    }

    fn request_url(&self, query: &str) -> Result<Url, AppError> {
        let mut params = vec![
            ("address", query.to_string()),
            ("key", self.api_key.clone()),
        ];
        if let Some(country) = &self.country {
            params.push(("region", country.alpha2.clone()));
        }
        Url::parse_with_params(GOOGLE_ENDPOINT, &params)
            .map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    formatted_address: String,
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
    location_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

fn classify(location_type: Option<&str>) -> MatchLevel {
    match location_type {
        Some("ROOFTOP") => MatchLevel::Exact,
        _ => MatchLevel::Approximate,
    }
}

fn to_match(result: GoogleResult) -> ProviderMatch {
    ProviderMatch {
        latitude: result.geometry.location.lat,
        longitude: result.geometry.location.lng,
        match_level: classify(result.geometry.location_type.as_deref()),
        display_name: result.formatted_address,
    }
}

fn interpret(body: GoogleResponse) -> Result<Option<ProviderMatch>, AppError> {
    match body.status.as_str() {
        "OK" => Ok(body.results.into_iter().next().map(to_match)),
        "ZERO_RESULTS" => Ok(None),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Err(AppError::RateLimitExceeded),
        status => Err(AppError::ProviderError {
            message: body
                .error_message
                .unwrap_or_else(|| format!("Google status {status}")),
            status_code: 200,
            retryable: status == "UNKNOWN_ERROR",
        }),
    }
}

impl Geocoder for GoogleGeocoder {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn geocode(&self, query: &str) -> Result<Option<ProviderMatch>, AppError> {
        let url = self.request_url(query)?;
        let response = self.client.get(url).send().await.map_err(map_send_error)?;
        let response = check_status(response, self.name()).await?;

        let body: GoogleResponse = response
            .json()
            .await
            .map_err(|e| body_error(self.name(), e))?;

        interpret(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_body(location_type: &str) -> GoogleResponse {
        serde_json::from_str(&format!(
            r#"{{
                "status": "OK",
                "results": [{{
                    "formatted_address": "Rua A, 10 - Maceió, AL, Brasil",
                    "geometry": {{
                        "location": {{"lat": -9.66, "lng": -35.73}},
                        "location_type": "{location_type}"
                    }}
                }}]
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn rooftop_is_exact() {
        let fix = interpret(ok_body("ROOFTOP")).unwrap().unwrap();
        assert_eq!(fix.match_level, MatchLevel::Exact);
        assert_eq!(fix.latitude, -9.66);
        assert_eq!(fix.display_name, "Rua A, 10 - Maceió, AL, Brasil");
    }

    #[test]
    fn interpolated_is_approximate() {
        let fix = interpret(ok_body("RANGE_INTERPOLATED")).unwrap().unwrap();
        assert_eq!(fix.match_level, MatchLevel::Approximate);
    }

    #[test]
    fn zero_results_is_clean_none() {
        let body: GoogleResponse =
            serde_json::from_str(r#"{"status": "ZERO_RESULTS", "results": []}"#).unwrap();
        assert!(interpret(body).unwrap().is_none());
    }

    #[test]
    fn over_query_limit_maps_to_rate_limit() {
        let body: GoogleResponse =
            serde_json::from_str(r#"{"status": "OVER_QUERY_LIMIT"}"#).unwrap();
        assert!(matches!(
            interpret(body).unwrap_err(),
            AppError::RateLimitExceeded
        ));
    }

    #[test]
    fn request_denied_is_not_retryable() {
        let body: GoogleResponse = serde_json::from_str(
            r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#,
        )
        .unwrap();
        let err = interpret(body).unwrap_err();
        assert!(!err.is_retryable());
    }
}
