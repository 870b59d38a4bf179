use std::time::{Duration, Instant};

/// Per-listener task-local rate limiter: the counter resets whenever a full
/// second has elapsed since the window started, compared with [`Instant`]
/// rather than wall-clock time so a system clock step never causes a
/// spurious reset or stall. `limit == 0` disables limiting entirely.
pub struct RateLimiter {
    limit: u32,
    count: u32,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            count: 0,
            window_start: Instant::now(),
        }
    }

    /// Returns `true` if this capture is admitted, `false` if it should be
    /// dropped for exceeding `rps_limit` within the current window.
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    fn admit_at(&mut self, now: Instant) -> bool {
        if self.limit == 0 {
            return true;
        }

        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.count = 0;
        }

        self.count += 1;
        self.count <= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_always_admits() {
        let mut limiter = RateLimiter::new(0);
        for _ in 0..10_000 {
            assert!(limiter.admit());
        }
    }

    #[test]
    fn admits_exactly_limit_per_window() {
        let mut limiter = RateLimiter::new(3);
        let t0 = Instant::now();

        assert!(limiter.admit_at(t0));
        assert!(limiter.admit_at(t0));
        assert!(limiter.admit_at(t0));
        assert!(!limiter.admit_at(t0));
    }

    #[test]
    fn window_elapsing_resets_the_counter() {
        let mut limiter = RateLimiter::new(1);
        let t0 = Instant::now();

        assert!(limiter.admit_at(t0));
        assert!(!limiter.admit_at(t0 + Duration::from_millis(500)));
        assert!(limiter.admit_at(t0 + Duration::from_millis(1000)));
    }
}
