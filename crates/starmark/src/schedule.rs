//! Redraw pacing for high-frequency viewer input.
//!
//! Pan events arrive at pointer rate and zooms in wheel bursts; both
//! trigger full redraws, so the host throttles the former and debounces
//! the latter. Both types take the current instant as a parameter instead
//! of reading the clock, which keeps them deterministic under test.

use std::time::{Duration, Instant};

/// Passes at most one event per interval; the rest are dropped. Suited to
/// pan tracking, where the newest state supersedes everything before it.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True when the caller should act on this event.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Fires once a quiet period has passed since the last trigger. Suited to
/// zoom, where only the settled level matters.
#[derive(Debug)]
pub struct Debounce {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    /// Record an event; pushes the pending deadline out.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    /// True exactly once per settled burst, when polled past the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// The instant the pending burst settles, for hosts that sleep until
    /// the next wakeup instead of polling.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
