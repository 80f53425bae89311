use std::sync::Arc;
use std::time::Duration;

use autopilot_lib::{coordinate::Coordinate, route::Step};
use tokio::{
    sync::{Mutex, broadcast},
    task::JoinHandle,
    time::MissedTickBehavior,
};

/// Playback lifecycle. Owned exclusively by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// One simulated position, published on every tick, strictly in step order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionUpdate {
    pub position: Coordinate,
    pub traveled_km: f64,
    pub index: usize,
    /// Set exactly once, on the terminal destination publish of a
    /// non-looping trip.
    pub finished: bool,
}

/// Clock-driven state machine advancing a cursor through the loaded steps.
///
/// At most one ticker task is ever live: every transition that (re)starts
/// playback aborts the previous ticker before spawning a new one.
#[derive(Clone)]
pub struct PlaybackScheduler {
    inner: Arc<Mutex<SchedulerInner>>,
    updates: broadcast::Sender<PositionUpdate>,
}

struct SchedulerInner {
    steps: Vec<Step>,
    cursor: usize,
    tick_interval: Duration,
    looping: bool,
    state: PlaybackState,
    ticker: Option<JoinHandle<()>>,
}

impl SchedulerInner {
    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl PlaybackScheduler {
    pub fn new(tick_interval: Duration) -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Mutex::new(SchedulerInner {
                steps: Vec::new(),
                cursor: 0,
                tick_interval,
                looping: false,
                state: PlaybackState::Idle,
                ticker: None,
            })),
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PositionUpdate> {
        self.updates.subscribe()
    }

    /// Replaces the loaded steps and rewinds. Any active ticker is cancelled.
    pub async fn load(&self, steps: Vec<Step>) {
        let mut inner = self.inner.lock().await;
        inner.cancel_ticker();
        inner.steps = steps;
        inner.cursor = 0;
        inner.state = PlaybackState::Idle;
    }

    /// From Idle or Paused, begins (or resumes) ticking. No-op while Running.
    pub async fn start(&self) {
        self.run(false).await
    }

    /// As [`Self::start`], but the cursor wraps to the first step upon
    /// reaching the last and playback continues indefinitely.
    pub async fn start_loop(&self) {
        self.run(true).await
    }

    async fn run(&self, looping: bool) {
        let mut inner = self.inner.lock().await;
        if inner.state == PlaybackState::Running {
            return;
        }
        if inner.steps.len() < 2 {
            tracing::warn!("playback requested with no steps loaded");
            return;
        }
        if inner.state == PlaybackState::Stopped {
            // restarting a completed trip replays it from the origin
            inner.cursor = 0;
        }

        inner.looping = looping;
        inner.cancel_ticker();
        inner.state = PlaybackState::Running;
        inner.ticker = Some(tokio::spawn(tick_loop(
            self.inner.clone(),
            self.updates.clone(),
        )));
    }

    /// From Running only: cancels the ticker, keeps the cursor. Otherwise a
    /// no-op.
    pub async fn pause(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != PlaybackState::Running {
            return;
        }
        inner.cancel_ticker();
        inner.state = PlaybackState::Paused;
    }

    /// From any state: cancels the ticker and rewinds to the first step.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        inner.cancel_ticker();
        inner.cursor = 0;
        inner.state = PlaybackState::Idle;
    }

    pub async fn state(&self) -> PlaybackState {
        self.inner.lock().await.state
    }

    pub async fn running(&self) -> bool {
        self.state().await == PlaybackState::Running
    }

    pub async fn paused(&self) -> bool {
        self.state().await == PlaybackState::Paused
    }

    pub async fn cursor(&self) -> usize {
        self.inner.lock().await.cursor
    }

    pub async fn position(&self) -> Option<Coordinate> {
        let inner = self.inner.lock().await;
        inner.steps.get(inner.cursor).map(|step| step.position)
    }
}

async fn tick_loop(
    inner: Arc<Mutex<SchedulerInner>>,
    updates: broadcast::Sender<PositionUpdate>,
) {
    let mut interval = {
        let inner = inner.lock().await;
        tokio::time::interval(inner.tick_interval)
    };
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately, consume it so every advance
    // waits a full interval
    interval.tick().await;

    loop {
        interval.tick().await;

        let mut guard = inner.lock().await;
        if guard.state != PlaybackState::Running {
            break;
        }

        let last = guard.steps.len() - 1;
        let next = guard.cursor + 1;
        if next <= last {
            guard.cursor = next;
            let step = guard.steps[next];
            let finished = next == last && !guard.looping;
            // a send with no subscribers is fine
            let _ = updates.send(PositionUpdate {
                position: step.position,
                traveled_km: step.traveled_km,
                index: next,
                finished,
            });
            if finished {
                guard.state = PlaybackState::Stopped;
                guard.ticker = None;
                break;
            }
        } else if guard.looping {
            guard.cursor = 0;
            let step = guard.steps[0];
            let _ = updates.send(PositionUpdate {
                position: step.position,
                traveled_km: step.traveled_km,
                index: 0,
                finished: false,
            });
        } else {
            // Cursor past the end while still Running: invariant breach.
            // Clamp rather than corrupt the cursor.
            debug_assert!(false, "ticked past the end of the step sequence");
            tracing::error!(
                cursor = guard.cursor,
                steps = guard.steps.len(),
                "ticked past the end of the step sequence, clamping"
            );
            guard.cursor = last;
            guard.state = PlaybackState::Stopped;
            guard.ticker = None;
            break;
        }
    }
}
