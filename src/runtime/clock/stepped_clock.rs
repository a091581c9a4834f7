use crate::runtime::clock::{Clock, CycleTime, ManualTime};
use std::time::Duration;
use time::OffsetDateTime;

/// Tick length of a typical microcontroller `millis()` loop.
pub const DEVICE_TICK: Duration = Duration::from_millis(1);

/// Simulation clock that moves one device tick per transaction.
///
/// The clock holds a budget of ticks. Every [`cycle_time`](Clock::cycle_time)
/// hands out the current tick and spends one, moving time forward by `tick`;
/// once the budget is spent the clock is exhausted and keeps reporting its
/// last time. Monotonic time is synthetic, so timeouts fire exactly as they
/// would against the board's own tick counter without any waiting.
#[derive(Debug, Clone)]
pub struct SteppedClock {
    time: ManualTime,
    tick: Duration,
    remaining: u64,
}

impl SteppedClock {
    /// A clock that runs `ticks` transactions, `tick` apart, starting at the
    /// Unix epoch.
    pub fn new(tick: Duration, ticks: u64) -> Self {
        Self {
            time: ManualTime::starting_at(OffsetDateTime::UNIX_EPOCH),
            tick,
            remaining: ticks,
        }
    }

    /// Enough ticks to cover `span`: the last one falls strictly before the
    /// end of the span.
    pub fn spanning(span: Duration, tick: Duration) -> Self {
        let ticks = if tick.is_zero() {
            u64::from(!span.is_zero())
        } else {
            u64::try_from(span.as_nanos().div_ceil(tick.as_nanos())).unwrap_or(u64::MAX)
        };
        Self::new(tick, ticks)
    }

    /// Moves the wall clock start, leaving the tick budget as is.
    pub fn starting_at(mut self, unix_time: OffsetDateTime) -> Self {
        self.time = ManualTime::starting_at(unix_time);
        self
    }

    pub const fn tick(&self) -> Duration {
        self.tick
    }

    /// Ticks left in the budget.
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Time covered by the ticks spent so far.
    pub const fn elapsed(&self) -> Duration {
        self.time.elapsed()
    }
}

impl Clock for SteppedClock {
    fn cycle_time(&mut self) -> CycleTime {
        let time = self.time.cycle_time();
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining > 0 && !self.time.advance(self.tick) {
                tracing::warn!(elapsed = ?self.time.elapsed(), "simulated time out of range");
                self.remaining = 0;
            }
        }
        time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spends_one_tick_per_cycle() {
        let mut clock = SteppedClock::new(DEVICE_TICK, 3);

        let first = clock.cycle_time();
        assert_eq!(first.unix_timestamp(), OffsetDateTime::UNIX_EPOCH);
        assert_eq!(clock.remaining(), 2);

        let second = clock.cycle_time();
        assert_eq!(second.now() - first.now(), DEVICE_TICK);

        let third = clock.cycle_time();
        assert_eq!(third.now() - first.now(), 2 * DEVICE_TICK);
        assert!(clock.is_exhausted());

        // an exhausted clock holds its last time
        assert_eq!(clock.cycle_time(), third);
        assert_eq!(clock.elapsed(), 2 * DEVICE_TICK);
    }

    #[test]
    fn test_spanning_rounds_up_to_cover_the_span() {
        assert_eq!(SteppedClock::spanning(Duration::from_secs(1), DEVICE_TICK).remaining(), 1000);

        let tick = Duration::from_millis(300);
        assert_eq!(SteppedClock::spanning(Duration::from_secs(1), tick).remaining(), 4);

        assert!(SteppedClock::spanning(Duration::ZERO, tick).is_exhausted());
        assert_eq!(SteppedClock::spanning(Duration::from_secs(1), Duration::ZERO).remaining(), 1);
    }

    #[test]
    fn test_starting_at_moves_wall_time_only() {
        let start = OffsetDateTime::UNIX_EPOCH + Duration::from_secs(86_400);
        let mut clock = SteppedClock::new(Duration::from_millis(50), 2).starting_at(start);

        assert_eq!(clock.cycle_time().unix_timestamp(), start);
        assert_eq!(
            clock.cycle_time().unix_timestamp(),
            start + Duration::from_millis(50)
        );
        assert!(clock.is_exhausted());
    }
}
