use crate::runtime::clock::{Clock, CycleTime};
use std::time::{Duration, Instant};
use time::OffsetDateTime;

const DEFAULT_MEASUREMENT_THRESHOLD: Duration = Duration::from_micros(1);
const DEFAULT_MAX_RETRIES: u32 = 8;
const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(3600);

/// Wall clock anchored to the monotonic clock.
///
/// The wall time baseline is sampled once (bracketed by two monotonic reads,
/// keeping the tightest of several attempts) and then extrapolated from the
/// monotonic clock, so `unix_time` advances smoothly between resyncs. The
/// baseline is refreshed every `resync_interval` to follow NTP adjustments.
#[derive(Debug)]
pub struct PrecisionClock {
    base_wall_time: OffsetDateTime,
    base_instant: Instant,
    last_resync: Instant,
    resync_interval: Duration,
    measurement_threshold: Duration,
    max_retries: u32,
    is_accurate: bool,
}

impl PrecisionClock {
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_RESYNC_INTERVAL,
            DEFAULT_MEASUREMENT_THRESHOLD,
            DEFAULT_MAX_RETRIES,
        )
    }

    pub fn with_config(
        resync_interval: Duration,
        measurement_threshold: Duration,
        max_retries: u32,
    ) -> Self {
        let now = Instant::now();
        let mut clock = Self {
            base_wall_time: OffsetDateTime::now_utc(),
            base_instant: now,
            last_resync: now,
            resync_interval,
            measurement_threshold,
            max_retries: max_retries.max(1),
            is_accurate: false,
        };
        clock.resync();
        clock
    }

    /// Whether the last baseline sample met the measurement threshold.
    pub const fn is_accurate(&self) -> bool {
        self.is_accurate
    }

    /// Re-samples the wall time baseline.
    pub fn resync(&mut self) {
        let mut best: Option<(Instant, OffsetDateTime, Duration)> = None;

        for _ in 0..self.max_retries {
            let before = Instant::now();
            let wall_time = OffsetDateTime::now_utc();
            let after = Instant::now();
            let variance = after - before;

            if best.is_none_or(|(_, _, best_variance)| variance < best_variance) {
                best = Some((before + variance / 2, wall_time, variance));
                if variance <= self.measurement_threshold {
                    break;
                }
            }
            std::hint::spin_loop();
        }

        if let Some((instant, wall_time, variance)) = best {
            self.base_instant = instant;
            self.base_wall_time = wall_time;
            self.last_resync = instant;
            self.is_accurate = variance <= self.measurement_threshold;

            if !self.is_accurate {
                tracing::debug!(
                    ?variance,
                    threshold = ?self.measurement_threshold,
                    "wall clock baseline above measurement threshold"
                );
            }
        }
    }
}

impl Clock for PrecisionClock {
    fn cycle_time(&mut self) -> CycleTime {
        let now = Instant::now();
        if now.duration_since(self.last_resync) >= self.resync_interval {
            self.resync();
        }

        let elapsed = now.saturating_duration_since(self.base_instant);
        CycleTime::new(now, self.base_wall_time + elapsed)
    }
}

impl Default for PrecisionClock {
    fn default() -> Self {
        Self::new()
    }
}
