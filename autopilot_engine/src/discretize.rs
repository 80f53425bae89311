use std::time::Duration;

use autopilot_lib::{
    coordinate::Coordinate,
    route::{Route, Step},
    travel_mode::Speed,
};
use geo::{Haversine, InterpolatableLine};

use crate::AutopilotError;

/// Derives the two waypoint sequences for a trip: the coarse `steps`
/// (route vertices annotated with cumulative distance) and the resampled
/// `accurate_steps` (one point per scheduler tick at the given speed, with
/// the final point forced to the exact destination).
///
/// Deterministic for a given (route, speed, tick interval).
pub fn discretize(
    route: &Route,
    speed: Speed,
    tick_interval: Duration,
) -> Result<(Vec<Step>, Vec<Step>), AutopilotError> {
    if route.distance_km() == 0.0 || route.points().iter().all(|p| *p == route.origin()) {
        return Err(AutopilotError::DegenerateRoute);
    }

    let steps = vertex_steps(route);
    let accurate_steps = resample(route, speed, tick_interval)?;
    Ok((steps, accurate_steps))
}

fn vertex_steps(route: &Route) -> Vec<Step> {
    let mut cumulative = 0.0;
    let mut raw = Vec::with_capacity(route.points().len());
    raw.push(0.0);
    for pair in route.points().windows(2) {
        cumulative += pair[0].haversine_km(&pair[1]);
        raw.push(cumulative);
    }

    // Rescale so the last vertex agrees with the service-reported length.
    let scale = if cumulative > 0.0 {
        route.distance_km() / cumulative
    } else {
        0.0
    };

    route
        .points()
        .iter()
        .zip(raw)
        .map(|(position, km)| Step::new(*position, km * scale))
        .collect()
}

fn resample(
    route: &Route,
    speed: Speed,
    tick_interval: Duration,
) -> Result<Vec<Step>, AutopilotError> {
    let total = route.distance_km();

    let Some(kmh) = speed.kmh() else {
        // Teleport collapses to a single terminal jump.
        return Ok(vec![
            Step::new(route.origin(), 0.0),
            Step::new(route.destination(), total),
        ]);
    };

    if !kmh.is_finite() || kmh <= 0.0 {
        return Err(AutopilotError::InvalidRoute(format!(
            "invalid speed: {kmh} km/h"
        )));
    }
    let km_per_tick = speed.km_per_tick(tick_interval).unwrap_or_default();
    if km_per_tick <= 0.0 {
        return Err(AutopilotError::InvalidRoute(
            "tick interval must be positive".to_string(),
        ));
    }

    let line = route.line_string();
    let ticks = (total / km_per_tick).ceil() as usize;
    let mut steps = Vec::with_capacity(ticks + 1);
    for i in 0..ticks {
        let traveled = i as f64 * km_per_tick;
        let position = if i == 0 {
            route.origin()
        } else {
            line.point_at_ratio_from_start(&Haversine, traveled / total)
                .map(Coordinate::from)
                .unwrap_or_else(|| route.origin().lerp(&route.destination(), traveled / total))
        };
        steps.push(Step::new(position, traveled));
    }
    // Forced exact destination, avoids floating-point overshoot.
    steps.push(Step::new(route.destination(), total));

    Ok(steps)
}
