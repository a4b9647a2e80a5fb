//! Injected simulation clocks and the recurring timer.
//!
//! The logger never reaches for a global world object to learn the time.
//! Hosts pass a [`Clock`] at construction; tests and the replay driver use
//! [`ManualClock`], which is advanced explicitly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of simulation time in seconds.
pub trait Clock: Send + Sync {
    /// Current simulation time in seconds.
    fn now(&self) -> f64;
}

/// A clock that only moves when told to. Cheap to clone; clones share time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at `start` seconds.
    pub fn new(start: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    /// Jump to `time` seconds.
    pub fn set(&self, time: f64) {
        self.bits.store(time.to_bits(), Ordering::Release);
    }

    /// Move forward by `delta` seconds. Returns the new time.
    pub fn advance(&self, delta: f64) -> f64 {
        let next = self.now() + delta;
        self.set(next);
        next
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Fixed-interval timer polled from the simulation tick.
///
/// Fires at most once per poll regardless of how many periods elapsed, so a
/// slow frame never causes a burst of catch-up callbacks. A non-positive
/// interval fires on every poll.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringTimer {
    interval: f64,
    next_due: f64,
}

impl RecurringTimer {
    /// Create a timer whose first firing is one `interval` after `start`.
    pub fn new(interval: f64, start: f64) -> Self {
        Self {
            interval,
            next_due: start + interval.max(0.0),
        }
    }

    /// Configured interval in seconds.
    pub const fn interval(&self) -> f64 {
        self.interval
    }

    /// Whether the timer fires on every poll.
    pub fn is_every_tick(&self) -> bool {
        self.interval <= 0.0
    }

    /// Poll at time `now`. Returns `true` if the timer fired.
    pub fn poll(&mut self, now: f64) -> bool {
        if self.is_every_tick() {
            return true;
        }
        if now < self.next_due {
            return false;
        }
        let missed = ((now - self.next_due) / self.interval).floor();
        self.next_due += (missed + 1.0) * self.interval;
        true
    }
}
