//! Fixed-cadence tick scheduling.
//!
//! Both halves run one tick function on a fixed period. [`Cadence`] sleeps
//! only between ticks, never inside one. When a tick overruns its slot the
//! missed deadlines are skipped rather than replayed in a burst.

use std::time::{Duration, Instant};

/// Deadline-based periodic ticker.
#[derive(Debug, Clone)]
pub struct Cadence {
    period: Duration,
    next: Instant,
    ticks: u64,
    overruns: u64,
}

impl Cadence {
    /// Start a cadence whose first deadline is one period from now.
    ///
    /// # Panics
    /// Panics if `period` is zero.
    pub fn new(period: Duration) -> Self {
        assert!(!period.is_zero(), "cadence period must be non-zero");
        Self {
            period,
            next: Instant::now() + period,
            ticks: 0,
            overruns: 0,
        }
    }

    /// Configured period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Deadlines reached so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Deadlines that had already passed when [`wait`](Self::wait) was called.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Sleep until the next deadline.
    ///
    /// Returns `false` if the deadline had already passed (the caller is
    /// running late); the schedule is then re-anchored to now.
    pub fn wait(&mut self) -> bool {
        let now = Instant::now();
        let on_time = self.advance(now);
        if on_time {
            std::thread::sleep(self.next - self.period - now);
        }
        on_time
    }

    /// Move to the next deadline as seen at `now`, without sleeping.
    ///
    /// Returns `true` if `now` is before the current deadline.
    fn advance(&mut self, now: Instant) -> bool {
        self.ticks += 1;
        if now <= self.next {
            self.next += self.period;
            true
        } else {
            self.overruns += 1;
            log::trace!("cadence overrun by {:?}", now - self.next);
            self.next = now + self.period;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_on_time_keeps_grid() {
        let mut cadence = Cadence::new(Duration::from_millis(10));
        let first = cadence.next;

        assert!(cadence.advance(first - Duration::from_millis(3)));
        assert_eq!(cadence.next, first + Duration::from_millis(10));
        assert_eq!(cadence.ticks(), 1);
        assert_eq!(cadence.overruns(), 0);
    }

    #[test]
    fn test_advance_late_skips_missed_deadlines() {
        let mut cadence = Cadence::new(Duration::from_millis(10));
        let late = cadence.next + Duration::from_millis(35);

        assert!(!cadence.advance(late));
        assert_eq!(cadence.next, late + Duration::from_millis(10));
        assert_eq!(cadence.overruns(), 1);
    }

    #[test]
    fn test_wait_sleeps_about_one_period() {
        let mut cadence = Cadence::new(Duration::from_millis(5));
        let start = Instant::now();
        cadence.wait();
        assert!(start.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    #[should_panic(expected = "cadence period must be non-zero")]
    fn test_zero_period_panics() {
        Cadence::new(Duration::ZERO);
    }
}
