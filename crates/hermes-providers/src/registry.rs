//! Provider cascade construction.
//!
//! The cascade is a finite ordered list of adapters sharing the
//! [`Geocoder`] capability, selected by credential presence at construction
//! time. Keyed providers come first, ordered by free-tier preference; the
//! keyless Nominatim fallback is always last. Each entry owns its own token
//! bucket (sized to the backend's published ceiling), circuit breaker, and
//! retry budget.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use hermes_core::error::AppError;
use hermes_core::geocode::ProviderEntry;
use hermes_core::models::{CountryFilter, ProviderMatch};
use hermes_core::rate_limit::TokenBucket;
use hermes_core::traits::Geocoder;
use reqwest::Client;

use crate::credentials::ProviderCredentials;
use crate::google::GoogleGeocoder;
use crate::here::HereGeocoder;
use crate::http::build_client;
use crate::locationiq::LocationIqGeocoder;
use crate::mapbox::MapboxGeocoder;
use crate::nominatim::NominatimGeocoder;
use crate::opencage::OpenCageGeocoder;
use crate::positionstack::PositionstackGeocoder;

/// Identifier for a geocoding backend, in cascade preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    Mapbox,
    Here,
    LocationIq,
    OpenCage,
    Positionstack,
    Nominatim,
}

impl ProviderKind {
    /// All backends, in default cascade order.
    pub fn all() -> [ProviderKind; 7] {
        [
            ProviderKind::Google,
            ProviderKind::Mapbox,
            ProviderKind::Here,
            ProviderKind::LocationIq,
            ProviderKind::OpenCage,
            ProviderKind::Positionstack,
            ProviderKind::Nominatim,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Mapbox => "mapbox",
            ProviderKind::Here => "here",
            ProviderKind::LocationIq => "locationiq",
            ProviderKind::OpenCage => "opencage",
            ProviderKind::Positionstack => "positionstack",
            ProviderKind::Nominatim => "nominatim",
        }
    }

    /// True when the backend cannot be used without a credential.
    pub fn requires_key(&self) -> bool {
        !matches!(self, ProviderKind::Nominatim)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(ProviderKind::Google),
            "mapbox" => Ok(ProviderKind::Mapbox),
            "here" => Ok(ProviderKind::Here),
            "locationiq" => Ok(ProviderKind::LocationIq),
            "opencage" => Ok(ProviderKind::OpenCage),
            "positionstack" => Ok(ProviderKind::Positionstack),
            "nominatim" => Ok(ProviderKind::Nominatim),
            _ => Err(format!("Unknown provider: {s}")),
        }
    }
}

/// One concrete adapter behind the shared [`Geocoder`] capability.
///
/// The capability trait is not object-safe (RPITIT), so the heterogeneous
/// cascade is expressed as an enum delegating to the adapters.
#[derive(Clone, Debug)]
pub enum Provider {
    Google(GoogleGeocoder),
    Mapbox(MapboxGeocoder),
    Here(HereGeocoder),
    LocationIq(LocationIqGeocoder),
    OpenCage(OpenCageGeocoder),
    Positionstack(PositionstackGeocoder),
    Nominatim(NominatimGeocoder),
}

impl Geocoder for Provider {
    fn name(&self) -> &'static str {
        match self {
            Provider::Google(g) => g.name(),
            Provider::Mapbox(g) => g.name(),
            Provider::Here(g) => g.name(),
            Provider::LocationIq(g) => g.name(),
            Provider::OpenCage(g) => g.name(),
            Provider::Positionstack(g) => g.name(),
            Provider::Nominatim(g) => g.name(),
        }
    }

    async fn geocode(&self, query: &str) -> Result<Option<ProviderMatch>, AppError> {
        match self {
            Provider::Google(g) => g.geocode(query).await,
            Provider::Mapbox(g) => g.geocode(query).await,
            Provider::Here(g) => g.geocode(query).await,
            Provider::LocationIq(g) => g.geocode(query).await,
            Provider::OpenCage(g) => g.geocode(query).await,
            Provider::Positionstack(g) => g.geocode(query).await,
            Provider::Nominatim(g) => g.geocode(query).await,
        }
    }
}

/// Request ceiling for a backend, as a token bucket.
fn bucket_for(kind: ProviderKind) -> TokenBucket {
    match kind {
        ProviderKind::Google | ProviderKind::Mapbox => TokenBucket::new(10, 10.0),
        ProviderKind::Here => TokenBucket::new(5, 5.0),
        ProviderKind::LocationIq => TokenBucket::new(2, 2.0),
        ProviderKind::OpenCage | ProviderKind::Positionstack => TokenBucket::new(1, 1.0),
        // Nominatim usage policy caps clients at one request per second;
        // pace at 1.1s intervals to stay clearly under it.
        ProviderKind::Nominatim => TokenBucket::per_interval(Duration::from_millis(1100)),
    }
}

/// Build one cascade entry, or `None` when the backend's credential is
/// missing.
fn build_entry(
    kind: ProviderKind,
    credentials: &ProviderCredentials,
    client: &Client,
    country: Option<&CountryFilter>,
) -> Option<ProviderEntry<Provider>> {
    let with_country = |provider: Provider| -> Provider {
        match (provider, country) {
            (Provider::Google(g), Some(c)) => Provider::Google(g.with_country(c.clone())),
            (Provider::Mapbox(g), Some(c)) => Provider::Mapbox(g.with_country(c.clone())),
            (Provider::Here(g), Some(c)) => Provider::Here(g.with_country(c.clone())),
            (Provider::LocationIq(g), Some(c)) => Provider::LocationIq(g.with_country(c.clone())),
            (Provider::OpenCage(g), Some(c)) => Provider::OpenCage(g.with_country(c.clone())),
            (Provider::Positionstack(g), Some(c)) => {
                Provider::Positionstack(g.with_country(c.clone()))
            }
            (Provider::Nominatim(g), Some(c)) => Provider::Nominatim(g.with_country(c.clone())),
            (provider, None) => provider,
        }
    };

    let provider = match kind {
        ProviderKind::Google => Provider::Google(GoogleGeocoder::new(
            client.clone(),
            credentials.google.clone()?,
        )),
        ProviderKind::Mapbox => Provider::Mapbox(MapboxGeocoder::new(
            client.clone(),
            credentials.mapbox.clone()?,
        )),
        ProviderKind::Here => {
            Provider::Here(HereGeocoder::new(client.clone(), credentials.here.clone()?))
        }
        ProviderKind::LocationIq => Provider::LocationIq(LocationIqGeocoder::new(
            client.clone(),
            credentials.locationiq.clone()?,
        )),
        ProviderKind::OpenCage => Provider::OpenCage(OpenCageGeocoder::new(
            client.clone(),
            credentials.opencage.clone()?,
        )),
        ProviderKind::Positionstack => Provider::Positionstack(PositionstackGeocoder::new(
            client.clone(),
            credentials.positionstack.clone()?,
        )),
        ProviderKind::Nominatim => Provider::Nominatim(NominatimGeocoder::new(client.clone())),
    };

    Some(ProviderEntry::new(with_country(provider)).with_limiter(bucket_for(kind)))
}

/// Build the default cascade: every backend with a credential, in
/// preference order, with keyless Nominatim as the last resort.
pub fn configured_providers(
    credentials: &ProviderCredentials,
    country: Option<&CountryFilter>,
) -> Result<Vec<ProviderEntry<Provider>>, AppError> {
    let client = build_client()?;
    let entries: Vec<_> = ProviderKind::all()
        .into_iter()
        .filter_map(|kind| build_entry(kind, credentials, &client, country))
        .collect();

    tracing::info!(
        providers = %entries
            .iter()
            .map(ProviderEntry::name)
            .collect::<Vec<_>>()
            .join(", "),
        "Provider cascade configured"
    );
    Ok(entries)
}

/// Build a cascade of explicitly requested backends, in the given order.
///
/// Requesting a keyed backend without its credential is a fatal
/// configuration error, raised before any processing begins.
pub fn select_providers(
    credentials: &ProviderCredentials,
    country: Option<&CountryFilter>,
    kinds: &[ProviderKind],
) -> Result<Vec<ProviderEntry<Provider>>, AppError> {
    let client = build_client()?;
    let mut entries = Vec::with_capacity(kinds.len());

    for &kind in kinds {
        match build_entry(kind, credentials, &client, country) {
            Some(entry) => entries.push(entry),
            None => {
                return Err(AppError::ConfigError(format!(
                    "provider '{kind}' requires HERMES_{}_API_KEY",
                    kind.as_str().to_uppercase()
                )));
            }
        }
    }

    Ok(entries)
}
