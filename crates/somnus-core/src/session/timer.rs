//! Session countdown
//!
//! Counts down whole seconds against the caller's clock. Nothing runs in
//! the background: [`Countdown::tick`] catches up on every second that has
//! elapsed since the last call.

use std::time::{Duration, Instant};

use thiserror::Error;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    #[error("Timer cannot be changed while a countdown is running")]
    CountdownActive,
}

/// Whole-second countdown; `0` minutes means no countdown
#[derive(Debug, Clone, Default)]
pub struct Countdown {
    remaining_seconds: u64,
    next_tick: Option<Instant>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting down `minutes` from `now`
    ///
    /// Zero minutes cancels instead.
    pub fn start(&mut self, minutes: u32, now: Instant) {
        if minutes == 0 {
            self.cancel();
            return;
        }
        self.remaining_seconds = minutes as u64 * 60;
        self.next_tick = Some(now + TICK);
        log::debug!("Countdown started: {} min", minutes);
    }

    pub fn cancel(&mut self) {
        self.remaining_seconds = 0;
        self.next_tick = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Seconds left, or `None` without a running countdown
    pub fn remaining_seconds(&self) -> Option<u64> {
        self.next_tick.map(|_| self.remaining_seconds)
    }

    /// Advance to `now`; returns true exactly once, when the count reaches zero
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(mut next) = self.next_tick else {
            return false;
        };

        while next <= now && self.remaining_seconds > 0 {
            self.remaining_seconds -= 1;
            next += TICK;
        }

        if self.remaining_seconds == 0 {
            self.cancel();
            return true;
        }
        self.next_tick = Some(next);
        false
    }
}
