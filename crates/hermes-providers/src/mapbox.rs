//! Mapbox Geocoding v6 adapter.
//!
//! Free tier: 100k requests/month. Uses the v6 forward endpoint (the v5
//! `mapbox.places` API wanted the query inside the URL path, which breaks
//! on addresses containing `/`).

use hermes_core::error::AppError;
use hermes_core::models::{CountryFilter, MatchLevel, ProviderMatch};
use hermes_core::traits::Geocoder;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::http::{body_error, check_status, map_send_error};

const MAPBOX_ENDPOINT: &str = "https://api.mapbox.com/search/geocode/v6/forward";

#[derive(Clone, Debug)]
pub struct MapboxGeocoder {
    client: Client,
    api_key: String,
    country: Option<CountryFilter>,
}

impl MapboxGeocoder {
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
            ("access_token", self.api_key.clone()),
            ("limit", "1".to_string()),
        ];
        if let Some(country) = &self.country {
            params.push(("country", country.alpha2.clone()));
        }
        Url::parse_with_params(MAPBOX_ENDPOINT, &params)
            .map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct MapboxResponse {
    #[serde(default)]
    features: Vec<MapboxFeature>,
}

#[derive(Debug, Deserialize)]
struct MapboxFeature {
    properties: MapboxProperties,
    geometry: MapboxGeometry,
}

#[derive(Debug, Deserialize)]
struct MapboxProperties {
    name: String,
    full_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MapboxGeometry {
    /// GeoJSON order: `[longitude, latitude]`.
    coordinates: [f64; 2],
}

fn to_match(feature: MapboxFeature) -> ProviderMatch {
    let [longitude, latitude] = feature.geometry.coordinates;
    ProviderMatch {
        latitude,
        longitude,
        display_name: feature
            .properties
            .full_address
            .unwrap_or(feature.properties.name),
        match_level: MatchLevel::Approximate,
    }
}

impl Geocoder for MapboxGeocoder {
    fn name(&self) -> &'static str {
        "mapbox"
    }

    async fn geocode(&self, query: &str) -> Result<Option<ProviderMatch>, AppError> {
        let url = self.request_url(query)?;
        let response = self.client.get(url).send().await.map_err(map_send_error)?;
        let response = check_status(response, self.name()).await?;

        let body: MapboxResponse = response
            .json()
            .await
            .map_err(|e| body_error(self.name(), e))?;

        Ok(body.features.into_iter().next().map(to_match))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_geojson_coordinate_order() {
        let json = r#"{
            "features": [{
                "properties": {
                    "name": "Rua A",
                    "full_address": "Rua A, 10, Maceió, Alagoas, Brazil"
                },
                "geometry": {"coordinates": [-35.73, -9.66]}
            }]
        }"#;
        let body: MapboxResponse = serde_json::from_str(json).unwrap();
        let fix = to_match(body.features.into_iter().next().unwrap());

        assert_eq!(fix.latitude, -9.66);
        assert_eq!(fix.longitude, -35.73);
        assert_eq!(fix.display_name, "Rua A, 10, Maceió, Alagoas, Brazil");
    }

    #[test]
    fn falls_back_to_name_without_full_address() {
        let json = r#"{
            "features": [{
                "properties": {"name": "Maceió"},
                "geometry": {"coordinates": [-35.73, -9.66]}
            }]
        }"#;
        let body: MapboxResponse = serde_json::from_str(json).unwrap();
        let fix = to_match(body.features.into_iter().next().unwrap());
        assert_eq!(fix.display_name, "Maceió");
    }

    #[test]
    fn no_features_deserializes_to_empty() {
        let body: MapboxResponse = serde_json::from_str(r#"{"features": []}"#).unwrap();
        assert!(body.features.is_empty());
    }
}
