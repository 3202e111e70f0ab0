use std::time::Duration;

/// Growth factor applied after each backoff wait.
const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Delay schedule between rate-limited run attempts.
///
/// Starts at `max(initial, 2 * poll_interval)` so a retry never comes
/// sooner than two poll cycles, grows by 1.5x per wait, and never exceeds
/// `max`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, poll_interval: Duration, max: Duration) -> Self {
        Self {
            current: initial.max(poll_interval.saturating_mul(2)),
            max,
        }
    }

    /// The delay to wait now; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let wait = self.current.min(self.max);
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * BACKOFF_MULTIPLIER)
            .unwrap_or(self.max)
            .min(self.max);
        wait
    }

    /// The delay [`Self::next_delay`] would return, without advancing.
    pub fn peek(&self) -> Duration {
        self.current.min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn starts_at_initial_when_above_floor() {
        let mut backoff = Backoff::new(secs(7.0), secs(2.0), secs(30.0));
        assert_eq!(backoff.next_delay(), secs(7.0));
    }

    #[test]
    fn floor_is_two_poll_intervals() {
        let mut backoff = Backoff::new(secs(1.0), secs(3.0), secs(30.0));
        assert_eq!(backoff.next_delay(), secs(6.0));
    }

    #[test]
    fn grows_by_half_and_caps_at_max() {
        let mut backoff = Backoff::new(secs(8.0), secs(1.0), secs(20.0));
        let delays: Vec<Duration> = (0..5).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![secs(8.0), secs(12.0), secs(18.0), secs(20.0), secs(20.0)]
        );
    }

    #[test]
    fn initial_above_max_is_clamped() {
        let mut backoff = Backoff::new(secs(90.0), secs(2.0), secs(60.0));
        assert_eq!(backoff.peek(), secs(60.0));
        assert_eq!(backoff.next_delay(), secs(60.0));
        assert_eq!(backoff.next_delay(), secs(60.0));
    }

    #[test]
    fn sequence_is_non_decreasing_and_bounded() {
        let max = secs(60.0);
        let mut backoff = Backoff::new(secs(12.0), secs(2.0), max);
        let mut previous = Duration::ZERO;
        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay >= previous, "{delay:?} < {previous:?}");
            assert!(delay <= max);
            previous = delay;
        }
        assert_eq!(previous, max);
    }

    #[test]
    fn growth_past_duration_range_settles_at_max() {
        let mut backoff = Backoff::new(Duration::MAX / 2, Duration::MAX, Duration::MAX);
        assert_eq!(backoff.next_delay(), Duration::MAX);
        assert_eq!(backoff.next_delay(), Duration::MAX);

        let huge = Duration::from_secs(u64::MAX / 4 * 3);
        let mut backoff = Backoff::new(huge, secs(1.0), Duration::MAX);
        assert_eq!(backoff.next_delay(), huge);
        assert_eq!(backoff.next_delay(), Duration::MAX);
    }
}
