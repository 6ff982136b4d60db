//! Positionstack adapter.
//!
//! Free tier: 25k requests/month, plain HTTP only (the paid tiers add TLS).
//! Result rows can carry null fields, so everything is optional until
//! proven present.

use hermes_core::error::AppError;
use hermes_core::models::{CountryFilter, MatchLevel, ProviderMatch};
use hermes_core::traits::Geocoder;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::http::{body_error, check_status, map_send_error};

const POSITIONSTACK_ENDPOINT: &str = "http://api.positionstack.com/v1/forward";

#[derive(Clone, Debug)]
pub struct PositionstackGeocoder {
    client: Client,
    api_key: String,
    country: Option<CountryFilter>,
}

impl PositionstackGeocoder {
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
            ("access_key", self.api_key.clone()),
            ("query", query.to_string()),
            ("limit", "1".to_string()),
        ];
        if let Some(country) = &self.country {
            params.push(("country", country.alpha2.to_uppercase()));
        }
        Url::parse_with_params(POSITIONSTACK_ENDPOINT, &params)
            .map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct PositionstackResponse {
    #[serde(default)]
    data: Vec<PositionstackRow>,
}

#[derive(Debug, Deserialize)]
struct PositionstackRow {
    latitude: Option<f64>,
    longitude: Option<f64>,
    label: Option<String>,
}

fn to_match(row: PositionstackRow) -> Option<ProviderMatch> {
    let latitude = row.latitude?;
    let longitude = row.longitude?;
    Some(ProviderMatch {
        latitude,
        longitude,
        display_name: row.label.unwrap_or_default(),
        match_level: MatchLevel::Approximate,
    })
}

impl Geocoder for PositionstackGeocoder {
    fn name(&self) -> &'static str {
        "positionstack"
    }

    async fn geocode(&self, query: &str) -> Result<Option<ProviderMatch>, AppError> {
        let url = self.request_url(query)?;
        let response = self.client.get(url).send().await.map_err(map_send_error)?;
        let response = check_status(response, self.name()).await?;

        let body: PositionstackResponse = response
            .json()
            .await
            .map_err(|e| body_error(self.name(), e))?;

        Ok(body.data.into_iter().next().and_then(to_match))
    }
}
