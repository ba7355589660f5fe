//! Tick Scheduler: one recurring timer per active session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::session::GameSession;

/// What the timer should do after a tick callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

/// Owned handle of a session's timer task.
#[derive(Debug)]
pub struct TickHandle(JoinHandle<()>);

impl TickHandle {
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    /// Cancel the timer, unless called from the timer task itself.
    ///
    /// The timer task leaves its loop on [`TickFlow::Stop`], so aborting it
    /// from inside would only cut short the teardown it is running.
    fn cancel(self) {
        if tokio::task::try_id() == Some(self.0.id()) {
            return;
        }
        self.0.abort();
    }
}

/// Spawns and cancels session timers.
#[derive(Debug, Clone, Copy)]
pub struct TickScheduler {
    period: Duration,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start the session's timer. The first tick fires one period from now.
    ///
    /// Returns `false` (and starts nothing) if the session already has one.
    pub fn start_ticking<F, Fut>(&self, session: &Arc<GameSession>, mut on_tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickFlow> + Send + 'static,
    {
        let period = self.period;
        let owner = session.owner();
        let start = Instant::now() + period;
        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if on_tick().await == TickFlow::Stop {
                    debug!(owner, "tick.stopped");
                    break;
                }
            }
        });

        match session.attach_ticker(TickHandle(task)) {
            Ok(()) => true,
            Err(duplicate) => {
                warn!(owner, "tick.already_running");
                duplicate.0.abort();
                false
            }
        }
    }

    /// Cancel the session's timer. Safe to call on every terminal path.
    pub fn stop_ticking(&self, session: &GameSession) {
        if let Some(handle) = session.detach_ticker() {
            handle.cancel();
        }
    }
}
