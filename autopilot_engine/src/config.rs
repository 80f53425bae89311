pub const DEFAULT_DIRECTIONS_URL: &str = "https://api.mapbox.com/directions/v5/mapbox";
pub const DEFAULT_GEOCODING_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";

/// Endpoints and credentials for the external maps services.
#[derive(Debug, Clone)]
pub struct MapsConfig {
    pub directions_url: String,
    pub geocoding_url: String,
    pub access_token: Option<String>,
    /// Two-letter country code used to bias geocoding results.
    pub country: Option<String>,
}

impl MapsConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Self::default()
        }
    }

    /// Reads `MAPBOX_ACCESS_TOKEN` and `AUTOPILOT_COUNTRY` from the
    /// environment. A missing token is reported later, when a request is
    /// actually made.
    pub fn from_env() -> Self {
        Self {
            access_token: std::env::var("MAPBOX_ACCESS_TOKEN").ok(),
            country: std::env::var("AUTOPILOT_COUNTRY").ok(),
            ..Self::default()
        }
    }
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            directions_url: DEFAULT_DIRECTIONS_URL.to_string(),
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
            access_token: None,
            country: None,
        }
    }
}
