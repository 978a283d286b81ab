use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval};
use tracing::debug;

/// Fixed recording ceiling in whole seconds
pub const RECORDING_CEILING_SECS: u32 = 10;

/// One whole second elapsed while armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub elapsed_secs: u32,
    /// Set on the pulse that reaches the ceiling; the timer is disarmed after it
    pub terminal: bool,
}

/// One-second countable clock for a recording session.
///
/// Pulses come from an interval that only exists while armed, and only
/// while the owner polls `pulse()`. `disarm` drops the interval, so no tick
/// scheduled before it can be observed afterwards.
pub struct SessionTimer {
    ceiling: u32,
    period: Duration,
    elapsed: u32,
    ticker: Option<Interval>,
}

impl SessionTimer {
    pub fn new(ceiling: u32, period: Duration) -> Self {
        Self {
            ceiling: ceiling.max(1),
            period,
            elapsed: 0,
            ticker: None,
        }
    }

    /// Start counting from zero
    pub fn arm(&mut self) {
        self.elapsed = 0;
        self.ticker = Some(interval_at(Instant::now() + self.period, self.period));
        debug!("Session timer armed (ceiling {}s)", self.ceiling);
    }

    /// Stop counting. Idempotent; `elapsed_secs` keeps its last value.
    pub fn disarm(&mut self) {
        if self.ticker.take().is_some() {
            debug!("Session timer disarmed at {}s", self.elapsed);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed
    }

    pub fn ceiling_secs(&self) -> u32 {
        self.ceiling
    }

    pub fn remaining_secs(&self) -> u32 {
        self.ceiling.saturating_sub(self.elapsed)
    }

    /// Wait for the next whole second. Never resolves while disarmed.
    pub async fn pulse(&mut self) -> Pulse {
        let Some(ticker) = self.ticker.as_mut() else {
            return std::future::pending().await;
        };

        ticker.tick().await;
        self.elapsed += 1;

        let terminal = self.elapsed >= self.ceiling;
        if terminal {
            self.ticker = None;
            debug!("Session timer reached ceiling");
        }

        Pulse {
            elapsed_secs: self.elapsed,
            terminal,
        }
    }
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new(RECORDING_CEILING_SECS, Duration::from_secs(1))
    }
}
