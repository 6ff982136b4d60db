//! OpenCage adapter.
//!
//! Free tier: 2500 requests/day at 1 req/s.

use hermes_core::error::AppError;
use hermes_core::models::{CountryFilter, MatchLevel, ProviderMatch};
use hermes_core::traits::Geocoder;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::http::{body_error, check_status, map_send_error};

const OPENCAGE_ENDPOINT: &str = "https://api.opencagedata.com/geocode/v1/json";

#[derive(Clone, Debug)]
pub struct OpenCageGeocoder {
    client: Client,
    api_key: String,
    country: Option<CountryFilter>,
}

impl OpenCageGeocoder {
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
            ("q", query.to_string()),
            ("key", self.api_key.clone()),
            ("limit", "1".to_string()),
            ("no_annotations", "1".to_string()),
        ];
        if let Some(country) = &self.country {
            params.push(("countrycode", country.alpha2.clone()));
        }
        Url::parse_with_params(OPENCAGE_ENDPOINT, &params)
            .map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct OpenCageResponse {
    #[serde(default)]
    results: Vec<OpenCageResult>,
}

#[derive(Debug, Deserialize)]
struct OpenCageResult {
    formatted: String,
    geometry: OpenCageGeometry,
}

#[derive(Debug, Deserialize)]
struct OpenCageGeometry {
    lat: f64,
    lng: f64,
}

fn to_match(result: OpenCageResult) -> ProviderMatch {
    ProviderMatch {
        latitude: result.geometry.lat,
        longitude: result.geometry.lng,
        display_name: result.formatted,
        match_level: MatchLevel::Approximate,
    }
}

impl Geocoder for OpenCageGeocoder {
    fn name(&self) -> &'static str {
        "opencage"
    }

    async fn geocode(&self, query: &str) -> Result<Option<ProviderMatch>, AppError> {
        let url = self.request_url(query)?;
        let response = self.client.get(url).send().await.map_err(map_send_error)?;
        let response = check_status(response, self.name()).await?;

        let body: OpenCageResponse = response
            .json()
            .await
            .map_err(|e| body_error(self.name(), e))?;

        Ok(body.results.into_iter().next().map(to_match))
    }
}
