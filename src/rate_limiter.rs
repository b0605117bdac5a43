use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota};
use log::debug;

use crate::core::GenericResult;

pub struct RateLimiter {
    limiters: Vec<DefaultDirectRateLimiter>,
}

impl RateLimiter {
    pub fn new() -> RateLimiter {
        RateLimiter {
            limiters: Vec::new(),
        }
    }

    pub fn with_limit(mut self, max_burst: u32, duration: Duration) -> GenericResult<RateLimiter> {
        let quota = NonZeroU32::new(max_burst)
            .and_then(|max_burst| {
                Quota::with_period(duration / max_burst.get()).map(|quota| quota.allow_burst(max_burst))
            })
            .ok_or_else(|| format!("Invalid rate limit: {max_burst} per {duration:?}"))?;

        self.limiters.push(governor::RateLimiter::direct(quota));
        Ok(self)
    }

    // Limiters should be added in order of decreasing duration: we wait for them one by one, so each
    // next wait drifts a little to the future.
    pub async fn wait(&self, name: &str) {
        for limiter in &self.limiters {
            if limiter.check().is_err() {
                debug!("Rate limiting {}...", name);
                limiter.until_ready().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst() {
        let limiter = RateLimiter::new().with_limit(3, Duration::from_secs(60)).unwrap();

        for _ in 0..3 {
            tokio::time::timeout(Duration::from_millis(100), limiter.wait("test")).await.unwrap();
        }
    }

    #[test]
    fn invalid_limit() {
        assert!(RateLimiter::new().with_limit(0, Duration::from_secs(1)).is_err());
    }
}
