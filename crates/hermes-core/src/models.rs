use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Maximum accepted length for a provider query string.
pub const MAX_QUERY_LEN: usize = 500;

/// A postal address record supplied by the caller.
///
/// The semantic fields feed query construction and cache keying; every other
/// column of the caller's source data rides along in `extra` and is carried
/// untouched into the matching [`GeocodeResult`] (and from there into the
/// export).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AddressRecord {
    pub street: Option<String>,
    pub number: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    /// Passthrough fields (person metadata, source columns, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AddressRecord {
    /// Record whose query string is exactly `query`.
    ///
    /// For callers that already hold a preformatted address line (e.g. the
    /// proxy server), rather than structured fields.
    pub fn from_query(query: impl Into<String>) -> Self {
        Self {
            street: Some(query.into()),
            ..Self::default()
        }
    }

    /// Build the human-readable query string sent to providers:
    /// `street, number, neighborhood, city, region, <country>, postal code`
    /// with empty parts skipped.
    pub fn query_string(&self, country: Option<&CountryFilter>) -> String {
        let street = non_empty(self.street.as_deref());
        let number = non_empty(self.number.as_deref());
        let street_number = match (street, number) {
            (Some(s), Some(n)) => Some(format!("{s}, {n}")),
            (Some(s), None) => Some(s.to_string()),
            _ => None,
        };

        let mut parts: Vec<String> = Vec::new();
        if let Some(sn) = street_number {
            parts.push(sn);
        }
        for field in [
            non_empty(self.neighborhood.as_deref()),
            non_empty(self.city.as_deref()),
            non_empty(self.region.as_deref()),
        ]
        .into_iter()
        .flatten()
        {
            parts.push(field.to_string());
        }
        if let Some(country) = country {
            parts.push(country.name.clone());
        }
        if let Some(cep) = non_empty(self.postal_code.as_deref()) {
            parts.push(cep.to_string());
        }

        parts.join(", ")
    }

    /// Canonical pipe-joined form used for cache keying: trimmed, lowercased
    /// fields with the postal code reduced to its digits. Country is not
    /// part of the key — the same record geocodes identically regardless of
    /// the configured country restriction's display name.
    pub fn normalized(&self) -> String {
        let postal_digits = self
            .postal_code
            .as_deref()
            .map(|cep| cep.chars().filter(char::is_ascii_digit).collect::<String>());

        [
            self.street.as_deref().map(str::trim).map(str::to_lowercase),
            self.number.as_deref().map(str::trim).map(str::to_lowercase),
            self.neighborhood
                .as_deref()
                .map(str::trim)
                .map(str::to_lowercase),
            self.city.as_deref().map(str::trim).map(str::to_lowercase),
            self.region.as_deref().map(str::trim).map(str::to_lowercase),
            postal_digits,
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("|")
    }

    /// Reject records that cannot form a usable provider query.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.normalized().is_empty() {
            return Err(AppError::ValidationError(
                "address record has no usable fields".into(),
            ));
        }
        let query = self.query_string(None);
        if query.len() > MAX_QUERY_LEN {
            return Err(AppError::ValidationError(format!(
                "address too long ({} chars, max {MAX_QUERY_LEN})",
                query.len()
            )));
        }
        Ok(())
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Country restriction applied to provider requests.
///
/// Providers disagree on the parameter format, so all three spellings are
/// carried: ISO 3166-1 alpha-2 (`br`), alpha-3 (`BRA`), and the display
/// name appended to query strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryFilter {
    pub alpha2: String,
    pub alpha3: String,
    pub name: String,
}

impl CountryFilter {
    pub fn new(
        alpha2: impl Into<String>,
        alpha3: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            alpha2: alpha2.into().to_lowercase(),
            alpha3: alpha3.into().to_uppercase(),
            name: name.into(),
        }
    }

    /// The deployment this pipeline was built for.
    pub fn brazil() -> Self {
        Self::new("br", "BRA", "Brasil")
    }
}

impl FromStr for CountryFilter {
    type Err = String;

    /// Accepts the shorthand `br` or an explicit `alpha2:alpha3:Name`
    /// triple (e.g. `pt:PRT:Portugal`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("br") {
            return Ok(CountryFilter::brazil());
        }
        match s.split(':').collect::<Vec<_>>().as_slice() {
            [alpha2, alpha3, name]
                if alpha2.len() == 2 && alpha3.len() == 3 && !name.is_empty() =>
            {
                Ok(CountryFilter::new(*alpha2, *alpha3, *name))
            }
            _ => Err(format!(
                "Invalid country '{s}': expected 'br' or 'alpha2:alpha3:Name'"
            )),
        }
    }
}

/// Confidence classifier for a geocoding outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLevel {
    Exact,
    Approximate,
    NoMatch,
    Error,
}

impl MatchLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchLevel::Exact => "exact",
            MatchLevel::Approximate => "approximate",
            MatchLevel::NoMatch => "no_match",
            MatchLevel::Error => "error",
        }
    }

    /// True for the levels a successful result is allowed to carry.
    pub fn is_positive(&self) -> bool {
        matches!(self, MatchLevel::Exact | MatchLevel::Approximate)
    }
}

impl fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MatchLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(MatchLevel::Exact),
            "approximate" => Ok(MatchLevel::Approximate),
            "no_match" => Ok(MatchLevel::NoMatch),
            "error" => Ok(MatchLevel::Error),
            _ => Err(format!("Unknown match level: {s}")),
        }
    }
}

/// A single positive answer extracted from one provider's response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMatch {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
    pub match_level: MatchLevel,
}

impl ProviderMatch {
    /// Coordinates at the exact (0, 0) origin are treated as a provider
    /// sentinel for "no position", never as a real fix.
    pub fn has_valid_coordinates(&self) -> bool {
        self.latitude != 0.0 || self.longitude != 0.0
    }
}

/// The outcome of geocoding one [`AddressRecord`].
///
/// Invariant: `success == true` implies non-zero coordinates and a positive
/// match level; the constructors below are the only way results are built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
    pub match_level: MatchLevel,
    pub success: bool,
    pub error_detail: Option<String>,
    pub source_provider: Option<String>,
    pub record: AddressRecord,
}

impl GeocodeResult {
    /// A provider produced a usable fix.
    pub fn matched(record: AddressRecord, fix: ProviderMatch, provider: impl Into<String>) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            display_name: fix.display_name,
            match_level: fix.match_level,
            success: true,
            error_detail: None,
            source_provider: Some(provider.into()),
            record,
        }
    }

    /// Every provider answered, none had a match. A legitimate outcome,
    /// not an error.
    pub fn no_match(record: AddressRecord, query: impl Into<String>) -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            display_name: query.into(),
            match_level: MatchLevel::NoMatch,
            success: false,
            error_detail: None,
            source_provider: None,
            record,
        }
    }

    /// The cascade ended on a provider failure.
    pub fn failed(
        record: AddressRecord,
        query: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            display_name: query.into(),
            match_level: MatchLevel::Error,
            success: false,
            error_detail: Some(detail.into()),
            source_provider: None,
            record,
        }
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
