//! BLE Scan Session
//!
//! A time-bounded discovery window that counts down once per second and
//! reports the remaining time to an optional callback.

use std::fmt;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Shortest accepted scan
pub const MIN_SCAN_DURATION: Duration = Duration::from_secs(1);
/// Longest accepted scan
pub const MAX_SCAN_DURATION: Duration = Duration::from_secs(30);
/// Countdown period
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Receives the remaining scan time; the last call is always `Duration::ZERO`
pub type ProgressCallback = Box<dyn FnMut(Duration) + Send + 'static>;

/// Clamp a requested duration into the accepted window
pub fn clamp_duration(requested: Duration) -> Duration {
    requested.clamp(MIN_SCAN_DURATION, MAX_SCAN_DURATION)
}

/// Result of one countdown step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still running, callback already told
    Progress(Duration),
    /// Countdown hit zero; the session must be finished
    Expired,
}

pub struct ScanSession {
    duration: Duration,
    remaining: Duration,
    ticker: Interval,
    on_progress: Option<ProgressCallback>,
}

impl ScanSession {
    /// Start a session; the first tick fires one period from now
    pub fn start(requested: Duration, on_progress: Option<ProgressCallback>) -> Self {
        let duration = clamp_duration(requested);
        let mut ticker = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        Self {
            duration,
            remaining: duration,
            ticker,
            on_progress,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Wait for the next countdown boundary
    pub async fn wait_tick(&mut self) {
        self.ticker.tick().await;
    }

    /// Decrement by one period (floored at zero) and report progress
    pub fn advance(&mut self) -> Tick {
        self.remaining = self.remaining.saturating_sub(TICK_PERIOD);
        if self.remaining.is_zero() {
            return Tick::Expired;
        }

        if let Some(callback) = self.on_progress.as_mut() {
            callback(self.remaining);
        }
        Tick::Progress(self.remaining)
    }

    /// End the session, delivering the terminal zero exactly once.
    ///
    /// Consumes the session so the timer and callback go away with it.
    pub fn finish(mut self) {
        self.remaining = Duration::ZERO;
        if let Some(mut callback) = self.on_progress.take() {
            callback(Duration::ZERO);
        }
    }
}

impl fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanSession")
            .field("duration", &self.duration)
            .field("remaining", &self.remaining)
            .field("has_callback", &self.on_progress.is_some())
            .finish()
    }
}
