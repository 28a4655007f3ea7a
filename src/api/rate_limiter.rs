use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;

use super::client::RateLimitConfig;

/// Token bucket shared by every request of one exchange client
pub struct RateLimiter {
    limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    clock: DefaultClock,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(per_second);

        let quota = Quota::per_second(per_second).allow_burst(burst);

        let clock = DefaultClock::default();

        Self {
            limiter: GovernorRateLimiter::direct_with_clock(quota, &clock),
            clock,
        }
    }

    /// Wait until the bucket has a token
    pub async fn acquire(&self) {
        while let Err(not_until) = self.limiter.check() {
            let wait = not_until.wait_time_from(self.clock.now());
            tokio::time::sleep(wait.max(Duration::from_millis(10))).await;
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_then_refusal() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_second: 5,
            burst_size: 2,
        });

        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_zero_rate_falls_back_to_one() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_second: 0,
            burst_size: 0,
        });

        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_second: 10,
            burst_size: 1,
        });

        limiter.acquire().await;

        let start = std::time::Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed().as_millis() >= 50);
    }
}
