use autopilot_lib::{coordinate::Coordinate, route::Route};
use serde::Deserialize;

use crate::{AutopilotError, config::MapsConfig};

/// Routing backend abstraction. The production implementation talks to a
/// directions HTTP service; tests drive [`crate::TripSession`] with a stub.
#[allow(async_fn_in_trait)]
pub trait RouteSource {
    async fn resolve(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Route, AutopilotError>;
}

pub struct RouteResolver {
    client: reqwest::Client,
    config: MapsConfig,
}

impl RouteResolver {
    pub fn new(config: MapsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

impl RouteSource for RouteResolver {
    async fn resolve(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Route, AutopilotError> {
        validate_endpoints(&origin, &destination)?;

        let Some(token) = self.config.access_token.as_deref() else {
            return Err(AutopilotError::RouteUnavailable(
                "missing maps access token".to_string(),
            ));
        };

        let url = format!(
            "{}/driving/{},{};{},{}",
            self.config.directions_url, origin.lng, origin.lat, destination.lng, destination.lat
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("geometries", "geojson"),
                ("overview", "full"),
                ("access_token", token),
            ])
            .send()
            .await
            .map_err(|err| {
                AutopilotError::RouteUnavailable(format!("directions request failed: {err}"))
            })?;

        if !response.status().is_success() {
            return Err(AutopilotError::RouteUnavailable(format!(
                "directions service returned {}",
                response.status()
            )));
        }

        let body: DirectionsResponse = response.json().await.map_err(|err| {
            AutopilotError::RouteUnavailable(format!("malformed directions response: {err}"))
        })?;

        route_from_response(body)
    }
}

pub(crate) fn validate_endpoints(
    origin: &Coordinate,
    destination: &Coordinate,
) -> Result<(), AutopilotError> {
    if !origin.is_valid() {
        return Err(AutopilotError::InvalidRoute(format!(
            "malformed origin: {origin:?}"
        )));
    }
    if !destination.is_valid() {
        return Err(AutopilotError::InvalidRoute(format!(
            "malformed destination: {destination:?}"
        )));
    }
    if origin == destination {
        return Err(AutopilotError::InvalidRoute(
            "origin equals destination".to_string(),
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
struct DirectionsResponse {
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize)]
struct DirectionsRoute {
    /// Meters.
    distance: f64,
    geometry: RouteGeometry,
}

#[derive(Deserialize)]
struct RouteGeometry {
    /// GeoJSON order: `[lng, lat]`.
    coordinates: Vec<[f64; 2]>,
}

fn route_from_response(response: DirectionsResponse) -> Result<Route, AutopilotError> {
    let best = response.routes.into_iter().next().ok_or_else(|| {
        AutopilotError::RouteUnavailable("directions service returned no routes".to_string())
    })?;

    let points = best
        .geometry
        .coordinates
        .iter()
        .map(|&[lng, lat]| Coordinate::new(lat, lng))
        .collect::<Vec<_>>();

    Route::new(points, best.distance / 1000.0).map_err(|err| {
        AutopilotError::RouteUnavailable(format!(
            "directions service returned an unusable route: {err}"
        ))
    })
}
