//! HERE Geocoding & Search adapter.
//!
//! Free tier: 250k requests/month, 5 req/s. One of the few backends that
//! reports a usable match classifier (`resultType`).

use hermes_core::error::AppError;
use hermes_core::models::{CountryFilter, MatchLevel, ProviderMatch};
use hermes_core::traits::Geocoder;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::http::{body_error, check_status, map_send_error};

const HERE_ENDPOINT: &str = "https://geocode.search.hereapi.com/v1/geocode";

#[derive(Clone, Debug)]
pub struct HereGeocoder {
    client: Client,
    api_key: String,
    country: Option<CountryFilter>,
}

impl HereGeocoder {
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
            ("apiKey", self.api_key.clone()),
            ("limit", "1".to_string()),
        ];
        if let Some(country) = &self.country {
            params.push(("in", format!("countryCode:{}", country.alpha3)));
        }
        Url::parse_with_params(HERE_ENDPOINT, &params)
            .map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct HereResponse {
    #[serde(default)]
    items: Vec<HereItem>,
}

#[derive(Debug, Deserialize)]
struct HereItem {
    title: String,
    position: HerePosition,
    #[serde(rename = "resultType")]
    result_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HerePosition {
    lat: f64,
    lng: f64,
}

/// `houseNumber` is a rooftop-grade hit; everything else (street, locality,
/// postal code centroid, ...) is approximate.
fn classify(result_type: Option<&str>) -> MatchLevel {
    match result_type {
        Some("houseNumber") => MatchLevel::Exact,
        _ => MatchLevel::Approximate,
    }
}

fn to_match(item: HereItem) -> ProviderMatch {
    ProviderMatch {
        latitude: item.position.lat,
        longitude: item.position.lng,
        match_level: classify(item.result_type.as_deref()),
        display_name: item.title,
    }
}

impl Geocoder for HereGeocoder {
    fn name(&self) -> &'static str {
        "here"
    }

    async fn geocode(&self, query: &str) -> Result<Option<ProviderMatch>, AppError> {
        let url = self.request_url(query)?;
        let response = self.client.get(url).send().await.map_err(map_send_error)?;
        let response = check_status(response, self.name()).await?;

        let body: HereResponse = response
            .json()
            .await
            .map_err(|e| body_error(self.name(), e))?;

        Ok(body.items.into_iter().next().map(to_match))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;

    #[test]
    fn parses_house_number_hit_as_exact() {
        let json = r#"{
            "items": [{
                "title": "Rua A, 10, Maceió - AL",
                "resultType": "houseNumber",
                "position": {"lat": -9.66, "lng": -35.73}
            }]
        }"#;
        let response: HereResponse = serde_json::from_str(json).unwrap();
        let fix = to_match(response.items.into_iter().next().unwrap());

        assert_eq!(fix.latitude, -9.66);
        assert_eq!(fix.longitude, -35.73);
        assert_eq!(fix.display_name, "Rua A, 10, Maceió - AL");
        assert_eq!(fix.match_level, MatchLevel::Exact);
    }

    #[test]
    fn street_level_hit_is_approximate() {
        assert_eq!(classify(Some("street")), MatchLevel::Approximate);
        assert_eq!(classify(Some("locality")), MatchLevel::Approximate);
        assert_eq!(classify(None), MatchLevel::Approximate);
    }

    #[test]
    fn empty_items_deserializes() {
        let response: HereResponse = serde_json::from_str("{}").unwrap();
        assert!(response.items.is_empty());
    }

    #[test]
    fn request_url_carries_country_restriction() {
        let geocoder = HereGeocoder::new(build_client().unwrap(), "k")
            .with_country(CountryFilter::brazil());
        let url = geocoder.request_url("Rua A, Maceió").unwrap();

        let query = url.query().unwrap();
        assert!(query.contains("in=countryCode%3ABRA"));
        assert!(query.contains("limit=1"));
    }
}
