//! # Rate Limit
//!
//! Token bucket bounding how fast the driver starts attempts across every
//! record. Owned by the driver task, so no interior locking.

use tokio::time::{Duration, Instant};

#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum tokens in the bucket
    capacity: f64,
    tokens: f64,
    /// Tokens added per second
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A bucket allowing `per_second` starts per second, with bursts of the
    /// same size. Zero disables limiting.
    #[must_use]
    pub fn per_second(per_second: u32) -> Self {
        let rate = f64::from(per_second);
        Self {
            capacity: rate,
            tokens: rate,
            refill_rate: rate,
            last_refill: Instant::now(),
        }
    }

    fn unlimited(&self) -> bool {
        self.refill_rate <= 0.0
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Take one token, or report how long until one is available
    ///
    /// # Errors
    ///
    /// The wait until the next token when the bucket is empty.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        if self.unlimited() {
            return Ok(());
        }
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }
        let missing = 1.0 - self.tokens;
        Err(Duration::from_secs_f64(missing / self.refill_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_refill() {
        let mut bucket = TokenBucket::per_second(2);
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_ok());
        let wait = bucket.try_acquire().unwrap_err();
        assert!(wait <= Duration::from_millis(500));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_capacity() {
        let mut bucket = TokenBucket::per_second(3);
        tokio::time::advance(Duration::from_secs(60)).await;
        for _ in 0..3 {
            assert!(bucket.try_acquire().is_ok());
        }
        assert!(bucket.try_acquire().is_err());
    }

    #[test]
    fn test_zero_rate_is_unlimited() {
        let mut bucket = TokenBucket::per_second(0);
        for _ in 0..1000 {
            assert!(bucket.try_acquire().is_ok());
        }
    }
}
