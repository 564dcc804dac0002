//! Time source for test cases
//!
//! Cases wait for real seconds on hardware. The simulated clock lets the
//! same cases run instantly against the simulated device, which reads the
//! same clock to decide how many bytes were captured.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub trait Clock {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Wall clock
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually advanced clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    now: Rc<Cell<Duration>>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
