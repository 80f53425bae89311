use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Travel mode presets exposed in the UI, each with a nominal speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Walk,
    Cycling,
    Subway,
    Truck,
    Car,
    Teleport,
}

impl TravelMode {
    pub const ALL: [TravelMode; 6] = [
        TravelMode::Walk,
        TravelMode::Cycling,
        TravelMode::Subway,
        TravelMode::Truck,
        TravelMode::Car,
        TravelMode::Teleport,
    ];

    pub fn speed(&self) -> Speed {
        match self {
            TravelMode::Walk => Speed::KmPerHour(9.0),
            TravelMode::Cycling => Speed::KmPerHour(13.0),
            TravelMode::Subway => Speed::KmPerHour(50.0),
            TravelMode::Truck => Speed::KmPerHour(80.0),
            TravelMode::Car => Speed::KmPerHour(120.0),
            TravelMode::Teleport => Speed::Instant,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TravelMode::Walk => "walk",
            TravelMode::Cycling => "cycling",
            TravelMode::Subway => "subway",
            TravelMode::Truck => "truck",
            TravelMode::Car => "car",
            TravelMode::Teleport => "teleport",
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TravelMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "walk" => Ok(TravelMode::Walk),
            "cycling" => Ok(TravelMode::Cycling),
            "subway" => Ok(TravelMode::Subway),
            "truck" => Ok(TravelMode::Truck),
            "car" => Ok(TravelMode::Car),
            "teleport" => Ok(TravelMode::Teleport),
            _ => Err("unknown travel mode"),
        }
    }
}

/// Either a constant speed or the teleport sentinel, for which the whole
/// trip collapses to a single jump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Speed {
    KmPerHour(f64),
    Instant,
}

impl Speed {
    pub fn kmh(&self) -> Option<f64> {
        match self {
            Speed::KmPerHour(kmh) => Some(*kmh),
            Speed::Instant => None,
        }
    }

    pub fn is_instant(&self) -> bool {
        matches!(self, Speed::Instant)
    }

    /// Distance covered per scheduler tick, in kilometers.
    pub fn km_per_tick(&self, tick_interval: Duration) -> Option<f64> {
        self.kmh()
            .map(|kmh| kmh * tick_interval.as_millis() as f64 / 3_600_000.0)
    }
}
