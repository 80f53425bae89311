use std::sync::Arc;
use std::time::Duration;

use autopilot_lib::{
    coordinate::Coordinate,
    route::{Route, Step},
    travel_mode::TravelMode,
};
use tokio::sync::{Mutex, broadcast};

use crate::{
    AutopilotError, DEFAULT_TICK_INTERVAL,
    discretize::discretize,
    resolver::RouteSource,
    scheduler::{PlaybackScheduler, PositionUpdate},
};

struct ScheduledTrip {
    route: Route,
    destination: Coordinate,
    steps: Vec<Step>,
    accurate_steps: Vec<Step>,
    /// The generation this trip was stored under, compared against
    /// `loaded_generation` to decide whether the scheduler needs a reload.
    generation: u64,
}

struct SessionInner {
    user_location: Coordinate,
    mode: TravelMode,
    /// Bumped by every `schedule_trip` and `stop`; a resolution carrying an
    /// older generation is stale and gets discarded.
    generation: u64,
    /// Generation of the steps currently loaded into the scheduler, 0 when
    /// nothing has been loaded yet.
    loaded_generation: u64,
    trip: Option<ScheduledTrip>,
}

/// The active trip: configuration, derived route data and playback control.
///
/// One session drives exactly one trip at a time; scheduling a new trip
/// replaces the previous one. All mutating calls are expected to come from
/// a single control task, but the session itself is cheaply cloneable and
/// internally synchronized.
pub struct TripSession<R: RouteSource> {
    resolver: Arc<R>,
    scheduler: PlaybackScheduler,
    tick_interval: Duration,
    inner: Arc<Mutex<SessionInner>>,
}

impl<R: RouteSource> Clone for TripSession<R> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            scheduler: self.scheduler.clone(),
            tick_interval: self.tick_interval,
            inner: self.inner.clone(),
        }
    }
}

impl<R: RouteSource> TripSession<R> {
    pub fn new(resolver: R, user_location: Coordinate) -> Self {
        Self::with_tick_interval(resolver, user_location, DEFAULT_TICK_INTERVAL)
    }

    pub fn with_tick_interval(
        resolver: R,
        user_location: Coordinate,
        tick_interval: Duration,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            scheduler: PlaybackScheduler::new(tick_interval),
            tick_interval,
            inner: Arc::new(Mutex::new(SessionInner {
                user_location,
                mode: TravelMode::Walk,
                generation: 0,
                loaded_generation: 0,
                trip: None,
            })),
        }
    }

    /// Resolves a route from the current user location to `(lat, lng)` and
    /// derives the step sequences. Never auto-starts playback. On failure
    /// the previously scheduled trip is left untouched.
    pub async fn schedule_trip(&self, lat: f64, lng: f64) -> Result<(), AutopilotError> {
        let destination = Coordinate::new(lat, lng);
        let (origin, mode, generation) = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            (inner.user_location, inner.mode, inner.generation)
        };

        let route = self.resolver.resolve(origin, destination).await?;
        let (steps, accurate_steps) = discretize(&route, mode.speed(), self.tick_interval)?;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            // a newer schedule_trip or a stop superseded this resolution
            tracing::warn!(generation, "discarding stale route resolution");
            return Ok(());
        }
        tracing::info!(
            distance_km = route.distance_km(),
            mode = %mode,
            "trip scheduled"
        );
        inner.trip = Some(ScheduledTrip {
            route,
            destination,
            steps,
            accurate_steps,
            generation,
        });
        Ok(())
    }

    /// Re-resolves the stored destination, used after a speed change.
    pub async fn reschedule(&self) -> Result<(), AutopilotError> {
        let destination = {
            let inner = self.inner.lock().await;
            inner.trip.as_ref().map(|trip| trip.destination)
        };
        match destination {
            Some(destination) => self.schedule_trip(destination.lat, destination.lng).await,
            None => Ok(()),
        }
    }

    pub async fn start(&self) {
        self.launch(false).await
    }

    pub async fn start_loop(&self) {
        self.launch(true).await
    }

    async fn launch(&self, looping: bool) {
        let mut inner = self.inner.lock().await;
        let (generation, steps) = match &inner.trip {
            Some(trip) => (trip.generation, trip.accurate_steps.clone()),
            None => {
                tracing::warn!("playback requested with no trip scheduled");
                return;
            }
        };

        // Resuming in place is only valid while the scheduler still holds
        // this trip's steps; after a reschedule or a new destination the
        // loaded steps are stale and must be replaced.
        if generation == inner.loaded_generation && self.scheduler.paused().await {
            drop(inner);
            // resume in place, the cursor is preserved
            if looping {
                self.scheduler.start_loop().await;
            } else {
                self.scheduler.start().await;
            }
            return;
        }

        // fresh copy of the immutable route data, so stopping and
        // restarting always replays from the original steps
        inner.loaded_generation = generation;
        drop(inner);
        self.scheduler.load(steps).await;
        if looping {
            self.scheduler.start_loop().await;
        } else {
            self.scheduler.start().await;
        }
        tracing::info!(looping, "trip started");
    }

    pub async fn pause(&self) {
        self.scheduler.pause().await;
    }

    /// Cancels playback and tears the trip down; the session is `clean`
    /// afterwards. Any in-flight route resolution is discarded.
    pub async fn stop(&self) {
        self.scheduler.stop().await;
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        if inner.trip.take().is_some() {
            tracing::info!("trip stopped");
        }
    }

    /// True when no trip is scheduled, the idle condition the UI keys off.
    pub async fn clean(&self) -> bool {
        self.inner.lock().await.trip.is_none()
    }

    pub async fn running(&self) -> bool {
        self.scheduler.running().await
    }

    pub async fn paused(&self) -> bool {
        self.scheduler.paused().await
    }

    pub async fn distance_km(&self) -> Option<f64> {
        let inner = self.inner.lock().await;
        inner.trip.as_ref().map(|trip| trip.route.distance_km())
    }

    /// Estimated travel time at the configured speed. `None` with no trip
    /// scheduled or for teleport.
    pub async fn travel_time(&self) -> Option<chrono::Duration> {
        let inner = self.inner.lock().await;
        let trip = inner.trip.as_ref()?;
        let kmh = inner.mode.speed().kmh()?;
        let seconds = trip.route.distance_km() / kmh * 3600.0;
        Some(chrono::Duration::seconds(seconds.round() as i64))
    }

    pub async fn destination(&self) -> Option<Coordinate> {
        let inner = self.inner.lock().await;
        inner.trip.as_ref().map(|trip| trip.destination)
    }

    pub async fn steps(&self) -> Vec<Step> {
        let inner = self.inner.lock().await;
        inner
            .trip
            .as_ref()
            .map(|trip| trip.steps.clone())
            .unwrap_or_default()
    }

    pub async fn accurate_steps(&self) -> Vec<Step> {
        let inner = self.inner.lock().await;
        inner
            .trip
            .as_ref()
            .map(|trip| trip.accurate_steps.clone())
            .unwrap_or_default()
    }

    pub async fn travel_mode(&self) -> TravelMode {
        self.inner.lock().await.mode
    }

    /// Changing the mode mid-trip pauses playback; the caller is expected
    /// to `reschedule` so the step spacing matches the new speed.
    pub async fn set_travel_mode(&self, mode: TravelMode) {
        self.scheduler.pause().await;
        self.inner.lock().await.mode = mode;
    }

    pub async fn user_location(&self) -> Coordinate {
        self.inner.lock().await.user_location
    }

    pub async fn set_user_location(&self, coordinate: Coordinate) {
        self.inner.lock().await.user_location = coordinate;
    }

    /// The position stream: one update per scheduler tick, in step order.
    pub fn subscribe(&self) -> broadcast::Receiver<PositionUpdate> {
        self.scheduler.subscribe()
    }
}

/// Renders an estimated travel time the way the trip summary shows it.
pub fn format_duration(duration: chrono::Duration) -> String {
    let minutes = duration.num_minutes();
    let hours = minutes / 60;
    let minutes = minutes % 60;
    if hours > 0 {
        format!("{hours} h {minutes:02} min")
    } else {
        format!("{minutes} min")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stub routing backend: straight two-point routes, with optional
    /// artificial delays/failures keyed by destination to exercise the
    /// stale-result guard.
    struct StubResolver {
        delay: Duration,
        /// When set, only this destination is delayed.
        delay_for: Option<Coordinate>,
        fail_for: Option<Coordinate>,
    }

    impl StubResolver {
        fn instant() -> Self {
            Self {
                delay: Duration::ZERO,
                delay_for: None,
                fail_for: None,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::instant()
            }
        }

        fn delayed_for(destination: Coordinate, delay: Duration) -> Self {
            Self {
                delay,
                delay_for: Some(destination),
                ..Self::instant()
            }
        }

        fn failing_for(destination: Coordinate) -> Self {
            Self {
                fail_for: Some(destination),
                ..Self::instant()
            }
        }
    }

    impl RouteSource for StubResolver {
        async fn resolve(
            &self,
            origin: Coordinate,
            destination: Coordinate,
        ) -> Result<Route, AutopilotError> {
            crate::resolver::validate_endpoints(&origin, &destination)?;
            let delayed = match self.delay_for {
                Some(only) => only == destination,
                None => !self.delay.is_zero(),
            };
            if delayed {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_for == Some(destination) {
                return Err(AutopilotError::RouteUnavailable("stub outage".to_string()));
            }
            let distance = origin.haversine_km(&destination);
            Ok(Route::new(vec![origin, destination], distance).unwrap())
        }
    }

    const ORIGIN: Coordinate = Coordinate {
        lat: 13.8299,
        lng: 100.5333,
    };
    const SIAM: Coordinate = Coordinate {
        lat: 13.7455,
        lng: 100.5340,
    };
    const TICK: Duration = Duration::from_secs(1);
    const FAST_TICK: Duration = Duration::from_millis(5);

    fn session(resolver: StubResolver) -> TripSession<StubResolver> {
        TripSession::with_tick_interval(resolver, ORIGIN, TICK)
    }

    /// Short tick for the playback tests; they ride teleport trips, so the
    /// step sequences stay tiny.
    fn fast_session(resolver: StubResolver) -> TripSession<StubResolver> {
        TripSession::with_tick_interval(resolver, ORIGIN, FAST_TICK)
    }

    #[tokio::test]
    async fn schedule_populates_without_starting() {
        let session = session(StubResolver::instant());
        assert!(session.clean().await);

        session.schedule_trip(SIAM.lat, SIAM.lng).await.unwrap();
        assert!(!session.clean().await);
        assert!(!session.running().await);
        assert_eq!(session.destination().await, Some(SIAM));

        let distance = session.distance_km().await.unwrap();
        assert!(distance > 9.0 && distance < 10.0);

        // walk at 9 km/h, time is distance / speed
        let time = session.travel_time().await.unwrap();
        let expected_secs = distance / 9.0 * 3600.0;
        assert!((time.num_seconds() as f64 - expected_secs).abs() < 1.0);

        let accurate = session.accurate_steps().await;
        assert_eq!(accurate.first().unwrap().position, ORIGIN);
        assert_eq!(accurate.last().unwrap().position, SIAM);
    }

    #[tokio::test]
    async fn same_point_trip_is_invalid_and_stays_clean() {
        let session = session(StubResolver::instant());
        let result = session.schedule_trip(ORIGIN.lat, ORIGIN.lng).await;
        assert!(matches!(result, Err(AutopilotError::InvalidRoute(_))));
        assert!(session.clean().await);
    }

    const BIGC: Coordinate = Coordinate {
        lat: 13.82683,
        lng: 100.52787,
    };

    #[tokio::test]
    async fn failed_schedule_leaves_previous_trip_intact() {
        let session = session(StubResolver::failing_for(BIGC));
        session.schedule_trip(SIAM.lat, SIAM.lng).await.unwrap();
        let distance = session.distance_km().await;

        let result = session.schedule_trip(BIGC.lat, BIGC.lng).await;
        assert!(matches!(result, Err(AutopilotError::RouteUnavailable(_))));

        // prior trip untouched, no partial overwrite
        assert!(!session.clean().await);
        assert_eq!(session.distance_km().await, distance);
        assert_eq!(session.destination().await, Some(SIAM));
    }

    #[tokio::test]
    async fn stale_resolution_is_discarded() {
        // only the first destination is slow, so A resolves after B
        let session = session(StubResolver::delayed_for(BIGC, Duration::from_millis(80)));

        let slow = session.clone();
        let pending = tokio::spawn(async move { slow.schedule_trip(BIGC.lat, BIGC.lng).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let fast = session.clone();
        let second = tokio::spawn(async move { fast.schedule_trip(SIAM.lat, SIAM.lng).await });

        pending.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(session.destination().await, Some(SIAM));
    }

    #[tokio::test]
    async fn stop_discards_in_flight_resolution() {
        let session = session(StubResolver::slow(Duration::from_millis(80)));
        let slow = session.clone();
        let pending =
            tokio::spawn(async move { slow.schedule_trip(SIAM.lat, SIAM.lng).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        session.stop().await;
        pending.await.unwrap().unwrap();

        // the late result must not resurrect the cancelled trip
        assert!(session.clean().await);
    }

    #[tokio::test]
    async fn playback_reaches_destination_and_stop_resets_clean() {
        let session = fast_session(StubResolver::instant());
        session.set_travel_mode(TravelMode::Teleport).await;
        session.schedule_trip(SIAM.lat, SIAM.lng).await.unwrap();

        let mut rx = session.subscribe();
        session.start().await;
        let update = rx.recv().await.unwrap();
        assert!(update.finished);
        assert_eq!(update.position, SIAM);

        session.stop().await;
        assert!(session.clean().await);
        assert!(session.accurate_steps().await.is_empty());
    }

    #[tokio::test]
    async fn speed_change_pauses_playback() {
        let session = session(StubResolver::instant());
        session.schedule_trip(SIAM.lat, SIAM.lng).await.unwrap();
        session.start().await;
        assert!(session.running().await);

        session.set_travel_mode(TravelMode::Car).await;
        assert!(session.paused().await);
        assert_eq!(session.travel_mode().await, TravelMode::Car);

        // the UI flow then re-resolves the stored destination
        session.reschedule().await.unwrap();
        assert_eq!(session.destination().await, Some(SIAM));
        let time = session.travel_time().await.unwrap();
        let distance = session.distance_km().await.unwrap();
        assert!((time.num_seconds() as f64 - distance / 120.0 * 3600.0).abs() < 1.0);
    }

    // A couple of blocks up the street, so walk-paced step sequences stay
    // small even at the fast test tick.
    const NEARBY: Coordinate = Coordinate {
        lat: 13.8300,
        lng: 100.5333,
    };

    #[tokio::test]
    async fn reschedule_after_speed_change_loads_the_new_steps() {
        let session = fast_session(StubResolver::instant());
        session.schedule_trip(NEARBY.lat, NEARBY.lng).await.unwrap();

        let mut rx = session.subscribe();
        session.start().await;
        let first = rx.recv().await.unwrap();
        assert!(!first.finished);
        // walk pace, still short of the destination
        assert_ne!(first.position, NEARBY);

        session.set_travel_mode(TravelMode::Teleport).await;
        assert!(session.paused().await);
        session.reschedule().await.unwrap();
        assert_eq!(session.accurate_steps().await.len(), 2);

        // drain whatever was published before the pause landed
        while rx.try_recv().is_ok() {}

        // resuming must play the rescheduled steps, not the walk-spaced
        // ones the scheduler was paused on
        session.start().await;
        let update = rx.recv().await.unwrap();
        assert_eq!(update.index, 1);
        assert_eq!(update.position, NEARBY);
        assert!(update.finished);
    }

    #[tokio::test]
    async fn new_destination_while_paused_switches_trips() {
        let session = fast_session(StubResolver::instant());
        session.set_travel_mode(TravelMode::Teleport).await;
        session.schedule_trip(SIAM.lat, SIAM.lng).await.unwrap();

        let mut rx = session.subscribe();
        session.start_loop().await;
        rx.recv().await.unwrap();
        session.pause().await;
        assert!(session.paused().await);

        session.schedule_trip(BIGC.lat, BIGC.lng).await.unwrap();
        while rx.try_recv().is_ok() {}

        session.start().await;
        let update = rx.recv().await.unwrap();
        assert_eq!(update.position, BIGC);
        assert!(update.finished);
        session.stop().await;
    }

    #[tokio::test]
    async fn loop_playback_replays_the_same_steps() {
        let session = fast_session(StubResolver::instant());
        session.set_travel_mode(TravelMode::Teleport).await;
        session.schedule_trip(SIAM.lat, SIAM.lng).await.unwrap();

        let mut rx = session.subscribe();
        session.start_loop().await;

        // teleport loop alternates destination and origin indefinitely
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        assert_eq!(first.index, 1);
        assert!(!first.finished);
        assert_eq!(second.index, 0);
        assert_eq!(third.index, 1);
        session.stop().await;
    }

    #[tokio::test]
    async fn scheduler_state_is_idle_before_start() {
        let session = session(StubResolver::instant());
        session.schedule_trip(SIAM.lat, SIAM.lng).await.unwrap();
        // scheduling never touches playback
        assert!(!session.running().await);
        assert!(!session.paused().await);
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(chrono::Duration::minutes(42)), "42 min");
        assert_eq!(
            format_duration(chrono::Duration::minutes(62)),
            "1 h 02 min"
        );
        assert_eq!(format_duration(chrono::Duration::hours(2)), "2 h 00 min");
    }
}
