/// API keys for the commercial geocoding backends.
///
/// Every key is optional: a missing key simply leaves that provider out of
/// the cascade (Nominatim needs none). Keys are plain configuration data —
/// provider auth flows are out of scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub google: Option<String>,
    pub mapbox: Option<String>,
    pub here: Option<String>,
    pub locationiq: Option<String>,
    pub opencage: Option<String>,
    pub positionstack: Option<String>,
}

impl ProviderCredentials {
    /// Read credentials from the environment.
    ///
    /// - `HERMES_GOOGLE_API_KEY`
    /// - `HERMES_MAPBOX_API_KEY`
    /// - `HERMES_HERE_API_KEY`
    /// - `HERMES_LOCATIONIQ_API_KEY`
    /// - `HERMES_OPENCAGE_API_KEY`
    /// - `HERMES_POSITIONSTACK_API_KEY`
    ///
    /// Unset and empty variables both count as "not configured".
    pub fn from_env() -> Self {
        Self {
            google: env_key("HERMES_GOOGLE_API_KEY"),
            mapbox: env_key("HERMES_MAPBOX_API_KEY"),
            here: env_key("HERMES_HERE_API_KEY"),
            locationiq: env_key("HERMES_LOCATIONIQ_API_KEY"),
            opencage: env_key("HERMES_OPENCAGE_API_KEY"),
            positionstack: env_key("HERMES_POSITIONSTACK_API_KEY"),
        }
    }

    /// True when no commercial provider is configured.
    pub fn is_empty(&self) -> bool {
        self.google.is_none()
            && self.mapbox.is_none()
            && self.here.is_none()
            && self.locationiq.is_none()
            && self.opencage.is_none()
            && self.positionstack.is_none()
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_empty() {
        assert!(ProviderCredentials::default().is_empty());
    }

    #[test]
    fn test_from_env_picks_up_keys() {
        // SAFETY: test-local variable name, no other thread reads it.
        unsafe { std::env::set_var("HERMES_HERE_API_KEY", "here-key-123") };
        let creds = ProviderCredentials::from_env();
        assert_eq!(creds.here.as_deref(), Some("here-key-123"));
        unsafe { std::env::remove_var("HERMES_HERE_API_KEY") };
    }

    #[test]
    fn test_blank_env_value_is_not_configured() {
        unsafe { std::env::set_var("HERMES_OPENCAGE_API_KEY", "   ") };
        let creds = ProviderCredentials::from_env();
        assert!(creds.opencage.is_none());
        unsafe { std::env::remove_var("HERMES_OPENCAGE_API_KEY") };
    }
}
