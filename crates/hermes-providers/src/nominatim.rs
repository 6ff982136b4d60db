//! Nominatim (OpenStreetMap) adapter.
//!
//! Keyless, which makes it the cascade's fallback of last resort. The usage
//! policy caps clients at 1 request/second and requires an identifying
//! User-Agent (set on the shared client). Coordinates come back as JSON
//! strings and need parsing.

use hermes_core::error::AppError;
use hermes_core::models::{CountryFilter, MatchLevel, ProviderMatch};
use hermes_core::traits::Geocoder;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::http::{body_error, check_status, map_send_error};

const NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";

#[derive(Clone, Debug)]
pub struct NominatimGeocoder {
    client: Client,
    country: Option<CountryFilter>,
}

impl NominatimGeocoder {
    pub fn new(client: Client) -> Self {
        Self {
            client,
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
            ("format", "json".to_string()),
            ("limit", "1".to_string()),
        ];
        if let Some(country) = &self.country {
            params.push(("countrycodes", country.alpha2.clone()));
        }
        Url::parse_with_params(NOMINATIM_ENDPOINT, &params)
            .map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct NominatimItem {
    lat: String,
    lon: String,
    display_name: String,
}

fn to_match(item: NominatimItem) -> Result<ProviderMatch, AppError> {
    let latitude: f64 = item
        .lat
        .parse()
        .map_err(|_| AppError::HttpError(format!("Nominatim returned bad latitude: {}", item.lat)))?;
    let longitude: f64 = item.lon.parse().map_err(|_| {
        AppError::HttpError(format!("Nominatim returned bad longitude: {}", item.lon))
    })?;

    Ok(ProviderMatch {
        latitude,
        longitude,
        display_name: item.display_name,
        // Nominatim reports no confidence classifier at this endpoint.
        match_level: MatchLevel::Approximate,
    })
}

impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn geocode(&self, query: &str) -> Result<Option<ProviderMatch>, AppError> {
        let url = self.request_url(query)?;
        let response = self.client.get(url).send().await.map_err(map_send_error)?;
        let response = check_status(response, self.name()).await?;

        let items: Vec<NominatimItem> = response
            .json()
            .await
            .map_err(|e| body_error(self.name(), e))?;

        items.into_iter().next().map(to_match).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;

    #[test]
    fn parses_string_coordinates() {
        let json = r#"[{
            "lat": "-9.6658",
            "lon": "-35.7353",
            "display_name": "Maceió, Alagoas, Brasil"
        }]"#;
        let items: Vec<NominatimItem> = serde_json::from_str(json).unwrap();
        let fix = to_match(items.into_iter().next().unwrap()).unwrap();

        assert_eq!(fix.latitude, -9.6658);
        assert_eq!(fix.longitude, -35.7353);
        assert_eq!(fix.match_level, MatchLevel::Approximate);
    }

    #[test]
    fn bad_coordinate_is_an_error_not_a_panic() {
        let item = NominatimItem {
            lat: "not-a-number".into(),
            lon: "-35.73".into(),
            display_name: "x".into(),
        };
        assert!(matches!(to_match(item), Err(AppError::HttpError(_))));
    }

    #[test]
    fn empty_array_means_no_match() {
        let items: Vec<NominatimItem> = serde_json::from_str("[]").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn request_url_restricts_country() {
        let geocoder =
            NominatimGeocoder::new(build_client().unwrap()).with_country(CountryFilter::brazil());
        let url = geocoder.request_url("Maceió").unwrap();
        assert!(url.query().unwrap().contains("countrycodes=br"));
        assert!(url.query().unwrap().contains("format=json"));
    }
}
