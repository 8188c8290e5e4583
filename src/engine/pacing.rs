//! Output pacing timer.
//!
//! The device drops SysEx that arrives too fast, so the session sends at most
//! one frame per interval. The timer is armed when the first frame is queued
//! and stops once the queue runs dry; it does not run while idle.

use std::time::{Duration, Instant};

/// Default spacing between outbound frames.
pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_millis(10);

/// One-frame-per-interval send timer.
#[derive(Debug, Clone)]
pub struct PacingTimer {
    interval: Duration,
    next_fire: Option<Instant>,
}

impl PacingTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_fire: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the timer unless it is already running.
    pub fn arm(&mut self, now: Instant) {
        if self.next_fire.is_none() {
            self.next_fire = Some(now + self.interval);
        }
    }

    /// Whether the timer is running.
    pub fn is_armed(&self) -> bool {
        self.next_fire.is_some()
    }

    /// When the next frame may go out.
    pub fn deadline(&self) -> Option<Instant> {
        self.next_fire
    }

    /// Whether the timer has fired at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_fire.is_some_and(|t| now >= t)
    }

    /// After a firing: schedule the next one if more frames are waiting,
    /// otherwise stop.
    pub fn fired(&mut self, now: Instant, more: bool) {
        self.next_fire = more.then(|| now + self.interval);
    }

    /// Stop the timer.
    pub fn disarm(&mut self) {
        self.next_fire = None;
    }
}

impl Default for PacingTimer {
    fn default() -> Self {
        Self::new(DEFAULT_PACING_INTERVAL)
    }
}
