pub mod kml;

pub use kml::{DEFAULT_MAX_PLACEMARKS, generate_kml, kml_documents};
