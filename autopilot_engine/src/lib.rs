use std::fmt;
use std::time::Duration;

pub mod config;
pub mod discretize;
pub mod geocoder;
pub mod resolver;
pub mod scheduler;
pub mod session;

pub use session::TripSession;

/// One simulated position update per second by default.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug)]
pub enum AutopilotError {
    /// Origin equals destination, or a coordinate is malformed.
    InvalidRoute(String),
    /// The routing/geocoding service failed, timed out or is misconfigured.
    RouteUnavailable(String),
    /// Discretization was invoked on a zero-length route. Upstream
    /// validation should make this unreachable.
    DegenerateRoute,
}

impl fmt::Display for AutopilotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutopilotError::InvalidRoute(msg) => write!(f, "invalid route: {msg}"),
            AutopilotError::RouteUnavailable(msg) => write!(f, "route unavailable: {msg}"),
            AutopilotError::DegenerateRoute => write!(f, "degenerate (zero-length) route"),
        }
    }
}

impl std::error::Error for AutopilotError {}
