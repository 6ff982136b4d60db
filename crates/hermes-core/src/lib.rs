pub mod batch;
pub mod cache;
pub mod circuit_breaker;
pub mod error;
pub mod geocode;
pub mod models;
pub mod rate_limit;
pub mod retry;
pub mod testutil;
pub mod traits;

pub use error::AppError;
pub use models::{AddressRecord, CountryFilter, GeocodeResult, MatchLevel, compute_hash};
pub use traits::Geocoder;
