//! Per-phase countdown
//!
//! The timer holds no task of its own. The coordinator service awaits
//! [`RoundTimer::wait`] inside its event loop and calls [`RoundTimer::tick`]
//! when it fires, so ticks are ordinary events on the single control flow and
//! cancelling is a plain synchronous state change.

use std::time::Duration;
use tokio::time::Instant;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// No timer is running
    Idle,
    /// Seconds left after this tick
    Running(u32),
    /// The countdown reached zero and cancelled itself
    Expired,
}

#[derive(Debug, Default)]
pub struct RoundTimer {
    remaining: Option<u32>,
    next_tick: Option<Instant>,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)start the countdown. Zero seconds only cancels.
    /// Returns the seconds remaining, if the timer is now running.
    pub fn start(&mut self, seconds: u32) -> Option<u32> {
        self.cancel();
        if seconds == 0 {
            return None;
        }
        self.remaining = Some(seconds);
        self.next_tick = Some(Instant::now() + TICK);
        self.remaining
    }

    pub fn cancel(&mut self) {
        self.remaining = None;
        self.next_tick = None;
    }

    pub fn is_active(&self) -> bool {
        self.remaining.is_some()
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    /// Resolves when the next tick is due; never resolves while idle
    pub async fn wait(&self) {
        match self.next_tick {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    }

    pub fn tick(&mut self) -> TimerTick {
        let Some(remaining) = self.remaining else {
            return TimerTick::Idle;
        };

        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.cancel();
            return TimerTick::Expired;
        }

        self.remaining = Some(remaining);
        self.next_tick = self.next_tick.map(|at| at + TICK);
        TimerTick::Running(remaining)
    }
}
