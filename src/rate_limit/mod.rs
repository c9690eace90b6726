use std::thread;
use std::time::{Duration, Instant};

/// Minimum-interval policy consulted before every remote call.
///
/// The first call goes through immediately; each later call sleeps until
/// `interval` has passed since the previous one was let through.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// A limiter that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Raise the interval to at least `floor`
    pub fn with_floor(mut self, floor: Duration) -> Self {
        self.interval = self.interval.max(floor);
        self
    }

    /// Block until the next call is allowed. Returns how long it slept.
    pub fn wait(&mut self) -> Duration {
        let now = Instant::now();
        let slept = match self.last {
            Some(last) if !self.interval.is_zero() => {
                let ready_at = last + self.interval;
                let pause = ready_at.saturating_duration_since(now);
                if !pause.is_zero() {
                    thread::sleep(pause);
                }
                pause
            }
            _ => Duration::ZERO,
        };
        self.last = Some(Instant::now());
        slept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_not_delayed() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5));
        assert_eq!(limiter.wait(), Duration::ZERO);
    }

    #[test]
    fn test_enforces_min_interval() {
        let mut limiter = RateLimiter::new(Duration::from_millis(30));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait();
        }
        // Two gaps of 30ms between three calls
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_disabled_never_sleeps() {
        let mut limiter = RateLimiter::disabled();
        for _ in 0..5 {
            assert_eq!(limiter.wait(), Duration::ZERO);
        }
    }

    #[test]
    fn test_floor() {
        let limiter = RateLimiter::new(Duration::from_millis(200)).with_floor(Duration::from_secs(1));
        assert_eq!(limiter.interval(), Duration::from_secs(1));

        let limiter = RateLimiter::new(Duration::from_secs(2)).with_floor(Duration::from_secs(1));
        assert_eq!(limiter.interval(), Duration::from_secs(2));
    }
}
