//! Wall clock driven by tokio's monotonic timer.

use ballot_types::{Clock, Timestamp};
use tokio::time::Instant;

/// Epoch seconds anchored at construction and advanced by [`tokio::time::Instant`].
///
/// Deadline checks and the scheduler's sleeps read the same time source, so
/// wall-clock jumps cannot shorten or stretch a round, and a paused tokio
/// runtime drives rounds deterministically in tests.
pub struct RuntimeClock {
    base: Timestamp,
    started: Instant,
}

impl RuntimeClock {
    pub fn new() -> Self {
        Self::starting_at(Timestamp::now())
    }

    pub fn starting_at(base: Timestamp) -> Self {
        Self {
            base,
            started: Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now(&self) -> Timestamp {
        self.base.plus_secs(self.started.elapsed().as_secs())
    }
}
