mod precision_clock;
mod stepped_clock;

#[cfg(any(test, feature = "testing"))]
mod test_clock;

use std::time::{Duration, Instant};

pub use precision_clock::PrecisionClock;
pub use stepped_clock::{DEVICE_TICK, SteppedClock};
pub use time::OffsetDateTime;

#[cfg(any(test, feature = "testing"))]
pub use test_clock::TestClock;

/// The time snapshot a transaction runs under.
///
/// - `instant`: monotonic time, used for timeouts and durations
/// - `unix_time`: wall clock time, for timestamps and display
///
/// Taken once at the start of a transaction; every node evaluated in that
/// transaction sees the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CycleTime {
    instant: Instant,
    unix_time: OffsetDateTime,
}

impl CycleTime {
    pub const fn new(instant: Instant, unix_time: OffsetDateTime) -> Self {
        Self { instant, unix_time }
    }

    pub const fn now(&self) -> Instant {
        self.instant
    }

    pub const fn unix_timestamp(&self) -> OffsetDateTime {
        self.unix_time
    }

    pub const fn unix_timestamp_nanos(&self) -> i128 {
        self.unix_time.unix_timestamp_nanos()
    }
}

/// Source of transaction time.
///
/// Implementations should capture the monotonic and wall clock components as
/// close together as possible. Successive calls must never move `instant`
/// backwards.
pub trait Clock {
    fn cycle_time(&mut self) -> CycleTime;
}

/// Synthetic time for the clocks that are moved by hand rather than by the
/// machine: a fixed monotonic origin plus elapsed time, mirrored onto a wall
/// clock start.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ManualTime {
    origin: Instant,
    start: OffsetDateTime,
    elapsed: Duration,
}

impl ManualTime {
    pub(crate) fn starting_at(start: OffsetDateTime) -> Self {
        Self {
            origin: Instant::now(),
            start,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) const fn origin(&self) -> Instant {
        self.origin
    }

    pub(crate) const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub(crate) fn cycle_time(&self) -> CycleTime {
        CycleTime::new(self.origin + self.elapsed, self.start + self.elapsed)
    }

    /// Moves forward by `by`. Returns `false`, leaving the time unchanged, if
    /// either side would leave its representable range.
    pub(crate) fn advance(&mut self, by: Duration) -> bool {
        let Some(elapsed) = self.elapsed.checked_add(by) else {
            return false;
        };
        let representable = self.origin.checked_add(elapsed).is_some()
            && time::Duration::try_from(elapsed)
                .ok()
                .and_then(|elapsed| self.start.checked_add(elapsed))
                .is_some();
        if representable {
            self.elapsed = elapsed;
        }
        representable
    }
}
