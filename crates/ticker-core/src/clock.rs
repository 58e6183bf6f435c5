//! Time source used for every wait in the firmware.
//!
//! The bounded connectivity waits, the poll interval and the restart grace
//! period all sleep through [`Clock`], so tests can run them on virtual time.

use std::time::{Duration, Instant};

/// Monotonic time and blocking sleep.
pub trait Clock: Send + Sync {
    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);

    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;
}

/// Wall clock backed by `std::thread::sleep`.
///
/// On ESP-IDF this maps to a FreeRTOS task delay.
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
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }

    fn now(&self) -> Duration {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }

    fn now(&self) -> Duration {
        (**self).now()
    }
}
