use autopilot_lib::coordinate::Coordinate;
use serde::Deserialize;

use crate::{AutopilotError, config::MapsConfig};

/// A ranked place suggestion from the geocoding service.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
}

/// Thin client for free-text destination search.
pub struct Geocoder {
    client: reqwest::Client,
    config: MapsConfig,
}

impl Geocoder {
    pub fn new(config: MapsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Place>, AutopilotError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let Some(token) = self.config.access_token.as_deref() else {
            return Err(AutopilotError::RouteUnavailable(
                "missing maps access token".to_string(),
            ));
        };

        let url = search_url(&self.config.geocoding_url, query);
        let mut request = self
            .client
            .get(&url)
            .query(&[("access_token", token)]);
        if let Some(country) = self.config.country.as_deref() {
            request = request.query(&[("country", country)]);
        }

        let response = request.send().await.map_err(|err| {
            AutopilotError::RouteUnavailable(format!("geocoding request failed: {err}"))
        })?;

        if !response.status().is_success() {
            return Err(AutopilotError::RouteUnavailable(format!(
                "geocoding service returned {}",
                response.status()
            )));
        }

        let body: GeocodingResponse = response.json().await.map_err(|err| {
            AutopilotError::RouteUnavailable(format!("malformed geocoding response: {err}"))
        })?;

        Ok(places_from_response(body))
    }
}

/// The query lands in the URL path, so it has to be percent-encoded or a
/// `/`, `?` or `#` in the free text would corrupt the request.
fn search_url(base: &str, query: &str) -> String {
    format!("{base}/{}.json", urlencoding::encode(query))
}

#[derive(Deserialize)]
struct GeocodingResponse {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    id: String,
    place_name: String,
    geometry: FeatureGeometry,
}

#[derive(Deserialize)]
struct FeatureGeometry {
    /// GeoJSON order: `[lng, lat]`, possibly with trailing dimensions.
    coordinates: Vec<f64>,
}

fn places_from_response(response: GeocodingResponse) -> Vec<Place> {
    response
        .features
        .into_iter()
        .filter_map(|feature| match feature.geometry.coordinates.as_slice() {
            [lng, lat, ..] => Some(Place {
                id: feature.id,
                name: feature.place_name,
                coordinate: Coordinate::new(*lat, *lng),
            }),
            _ => None,
        })
        .collect()
}
