use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::lock;
use crate::clock::Clock;

#[derive(Debug, Default)]
struct Timeline {
    now: Duration,
    sleeps: Vec<Duration>,
}

/// Virtual clock: `sleep` advances time instantly and is recorded.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    timeline: Arc<Mutex<Timeline>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.timeline).sleeps.clone()
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) {
        let mut timeline = lock(&self.timeline);
        timeline.now += duration;
        timeline.sleeps.push(duration);
    }

    fn now(&self) -> Duration {
        lock(&self.timeline).now
    }
}
