use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Time source for timer subsystems.
///
/// Injected at construction so the same component runs against wall
/// time on a robot and against a stepped clock in tests.
pub trait Clock {
    /// Monotonic time since some fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock time from [`Instant`], origin at construction.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually stepped clock for deterministic tests.
///
/// Clones share the same underlying time, so a test keeps one handle
/// and hands clones to the subsystems under test.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
