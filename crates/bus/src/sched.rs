//! Clock abstraction and the handshake retry timer queue.
//!
//! Handshake retries are the only time-driven behaviour on the bus, and they
//! are driven from [`Bus::pump`](crate::Bus::pump) against an injected
//! [`Clock`] so the bounded-retry property is testable without wall-clock
//! delays.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use smallvec::SmallVec;

/// Source of monotonic time for the bus.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real monotonic time.
#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
pub struct ManualClock {
    epoch: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves time forward; never backwards.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.epoch + *self.offset.lock()
    }
}

/// At most one pending retry per peer.
pub(crate) struct TimerQueue {
    entries: Vec<(Instant, String)>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Schedules (or reschedules) the retry for `peer`.
    pub fn schedule(&mut self, peer: &str, due: Instant) {
        self.cancel(peer);
        self.entries.push((due, peer.to_string()));
    }

    pub fn cancel(&mut self, peer: &str) {
        self.entries.retain(|(_, p)| p != peer);
    }

    /// Removes and returns every peer whose retry is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> SmallVec<[String; 4]> {
        let mut due = SmallVec::new();
        self.entries.retain(|(when, peer)| {
            if *when <= now {
                due.push(peer.clone());
                false
            } else {
                true
            }
        });
        due
    }
}
