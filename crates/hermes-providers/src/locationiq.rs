//! LocationIQ adapter.
//!
//! Free tier: 5000 requests/day at 2 req/s. The API is Nominatim-compatible
//! (string coordinates, same item shape) but requires a key.

use hermes_core::error::AppError;
use hermes_core::models::{CountryFilter, MatchLevel, ProviderMatch};
use hermes_core::traits::Geocoder;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::http::{body_error, check_status, map_send_error};

const LOCATIONIQ_ENDPOINT: &str = "https://us1.locationiq.com/v1/search";

#[derive(Clone, Debug)]
pub struct LocationIqGeocoder {
    client: Client,
    api_key: String,
    country: Option<CountryFilter>,
}

impl LocationIqGeocoder {
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
            ("format", "json".to_string()),
            ("limit", "1".to_string()),
        ];
        if let Some(country) = &self.country {
            params.push(("countrycodes", country.alpha2.clone()));
        }
        Url::parse_with_params(LOCATIONIQ_ENDPOINT, &params)
            .map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct LocationIqItem {
    lat: String,
    lon: String,
    display_name: String,
}

fn to_match(item: LocationIqItem) -> Result<ProviderMatch, AppError> {
    let latitude: f64 = item.lat.parse().map_err(|_| {
        AppError::HttpError(format!("LocationIQ returned bad latitude: {}", item.lat))
    })?;
    let longitude: f64 = item.lon.parse().map_err(|_| {
        AppError::HttpError(format!("LocationIQ returned bad longitude: {}", item.lon))
    })?;

    Ok(ProviderMatch {
        latitude,
        longitude,
        display_name: item.display_name,
        match_level: MatchLevel::Approximate,
    })
}

impl Geocoder for LocationIqGeocoder {
    fn name(&self) -> &'static str {
        "locationiq"
    }

    async fn geocode(&self, query: &str) -> Result<Option<ProviderMatch>, AppError> {
        let url = self.request_url(query)?;
        let response = self.client.get(url).send().await.map_err(map_send_error)?;

        // LocationIQ answers 404 for "no place found" rather than an empty
        // array; that is a clean no-match, not an error.
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = check_status(response, self.name()).await?;

        let items: Vec<LocationIqItem> = response
            .json()
            .await
            .map_err(|e| body_error(self.name(), e))?;

        items.into_iter().next().map(to_match).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_compatible_items() {
        let json = r#"[{
            "lat": "-9.66599",
            "lon": "-35.735",
            "display_name": "Rua A, Maceió, Alagoas, Brasil"
        }]"#;
        let items: Vec<LocationIqItem> = serde_json::from_str(json).unwrap();
        let fix = to_match(items.into_iter().next().unwrap()).unwrap();

        assert_eq!(fix.latitude, -9.66599);
        assert_eq!(fix.longitude, -35.735);
        assert_eq!(fix.match_level, MatchLevel::Approximate);
    }

    #[test]
    fn bad_coordinates_surface_as_errors() {
        let item = LocationIqItem {
            lat: "-9.66".into(),
            lon: "east".into(),
            display_name: "x".into(),
        };
        assert!(to_match(item).is_err());
    }
}
