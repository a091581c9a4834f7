use enum_as_inner::EnumAsInner;
use std::time::Instant;

/// Per-node wake-up request.
///
/// ```text
///   Idle ──arm──► Armed(at) ──now >= at──► Fired(at) ──retire──► Idle
///                    ▲                         │
///                    └─────────arm─────────────┘
/// ```
///
/// A timeout that fires stays `Fired` for the whole transaction so the
/// node's own evaluation can observe it. If the node re-arms or clears it
/// during that evaluation the new state sticks; otherwise the end of the
/// transaction retires it back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumAsInner)]
pub enum Timeout {
    #[default]
    Idle,
    Armed(Instant),
    Fired(Instant),
}

impl Timeout {
    /// Requests a wake-up at `at`, replacing any pending request.
    #[inline(always)]
    pub(crate) fn arm(&mut self, at: Instant) {
        *self = Timeout::Armed(at);
    }

    #[inline(always)]
    pub(crate) fn clear(&mut self) {
        *self = Timeout::Idle;
    }

    /// Moves an overdue `Armed` timeout to `Fired`. Returns `true` if it fired.
    #[inline(always)]
    pub(crate) fn poll(&mut self, now: Instant) -> bool {
        match *self {
            Timeout::Armed(at) if at <= now => {
                *self = Timeout::Fired(at);
                true
            }
            _ => false,
        }
    }

    /// End-of-transaction cleanup: a timeout still `Fired` was not re-armed.
    #[inline(always)]
    pub(crate) fn retire(&mut self) {
        if self.is_fired() {
            *self = Timeout::Idle;
        }
    }

    /// The pending wake-up time, if armed.
    pub const fn deadline(&self) -> Option<Instant> {
        match *self {
            Timeout::Armed(at) => Some(at),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fires_once_deadline_reached() {
        let start = Instant::now();
        let mut timeout = Timeout::default();
        timeout.arm(start + Duration::from_millis(10));

        assert!(!timeout.poll(start));
        assert!(timeout.is_armed());

        assert!(timeout.poll(start + Duration::from_millis(10)));
        assert!(timeout.is_fired());

        // firing again needs a new request
        assert!(!timeout.poll(start + Duration::from_millis(20)));
    }

    #[test]
    fn test_retire_only_clears_fired() {
        let start = Instant::now();
        let mut timeout = Timeout::default();
        timeout.arm(start);
        timeout.retire();
        assert_eq!(timeout, Timeout::Armed(start));

        timeout.poll(start);
        timeout.retire();
        assert_eq!(timeout, Timeout::Idle);
    }

    #[test]
    fn test_rearm_after_fire_survives_retire() {
        let start = Instant::now();
        let mut timeout = Timeout::default();
        timeout.arm(start);
        timeout.poll(start);

        timeout.arm(start + Duration::from_millis(5));
        timeout.retire();
        assert_eq!(timeout.deadline(), Some(start + Duration::from_millis(5)));
    }

    #[test]
    fn test_clear_cancels() {
        let start = Instant::now();
        let mut timeout = Timeout::default();
        timeout.arm(start);
        timeout.clear();
        assert!(!timeout.poll(start + Duration::from_secs(1)));
        assert_eq!(timeout.deadline(), None);
    }
}
