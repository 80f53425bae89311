use geo_types::{Coord, LineString};
use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

/// A resolved path between two points plus its total length in kilometers,
/// as reported by the routing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    points: Vec<Coordinate>,
    distance_km: f64,
}

impl Route {
    pub fn new(points: Vec<Coordinate>, distance_km: f64) -> Result<Self, &'static str> {
        if points.len() < 2 {
            return Err("route must contain at least two points");
        }
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err("route distance must be non-negative");
        }
        Ok(Self {
            points,
            distance_km,
        })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn origin(&self) -> Coordinate {
        self.points[0]
    }

    pub fn destination(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn line_string(&self) -> LineString {
        LineString::from(
            self.points
                .iter()
                .map(|c| Coord { x: c.lng, y: c.lat })
                .collect::<Vec<_>>(),
        )
    }
}

/// A waypoint annotated with its cumulative distance from the route origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub position: Coordinate,
    pub traveled_km: f64,
}

impl Step {
    pub fn new(position: Coordinate, traveled_km: f64) -> Self {
        Self {
            position,
            traveled_km,
        }
    }
}
