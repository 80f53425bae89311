use geo::{Haversine, Length, line_string};
use geo_types::Point;
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in floating-point degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance to `other` in kilometers.
    pub fn haversine_km(&self, other: &Coordinate) -> f64 {
        let line = line_string![Point::from(*self).0, Point::from(*other).0];
        Haversine.length(&line) / 1000.0
    }

    /// Linear interpolation towards `other`. `t` is clamped to `[0, 1]`.
    pub fn lerp(&self, other: &Coordinate, t: f64) -> Coordinate {
        let t = t.clamp(0.0, 1.0);
        Coordinate {
            lat: self.lat + (other.lat - self.lat) * t,
            lng: self.lng + (other.lng - self.lng) * t,
        }
    }
}

impl From<Coordinate> for Point {
    fn from(coordinate: Coordinate) -> Self {
        Point::new(coordinate.lng, coordinate.lat)
    }
}

impl From<Point> for Coordinate {
    fn from(point: Point) -> Self {
        Coordinate {
            lat: point.y(),
            lng: point.x(),
        }
    }
}
