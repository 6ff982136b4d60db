pub mod credentials;
pub mod google;
pub mod here;
pub mod http;
pub mod locationiq;
pub mod mapbox;
pub mod nominatim;
pub mod opencage;
pub mod positionstack;
pub mod registry;

pub use credentials::ProviderCredentials;
pub use http::build_client;
pub use registry::{Provider, ProviderKind, configured_providers, select_providers};
