use crate::runtime::clock::{Clock, CycleTime, ManualTime};
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

/// Clock moved only by [`advance`](Self::advance).
///
/// Clones share one time, so a test can keep a handle while the executor or
/// runtime owns another.
#[derive(Debug, Clone)]
pub struct TestClock {
    time: Rc<Cell<ManualTime>>,
}

impl TestClock {
    /// Starts at the Unix epoch.
    pub fn new() -> Self {
        Self::starting_at(OffsetDateTime::UNIX_EPOCH)
    }

    pub fn starting_at(unix_time: OffsetDateTime) -> Self {
        Self {
            time: Rc::new(Cell::new(ManualTime::starting_at(unix_time))),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut time = self.time.get();
        if !time.advance(by) {
            tracing::warn!(?by, "test clock advance out of range, ignored");
        }
        self.time.set(time);
    }

    pub fn elapsed(&self) -> Duration {
        self.time.get().elapsed()
    }

    /// The monotonic instant at zero elapsed time.
    pub fn origin(&self) -> Instant {
        self.time.get().origin()
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn cycle_time(&mut self) -> CycleTime {
        self.time.get().cycle_time()
    }
}
