use std::time::Duration;
use log::debug;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use crate::{Error, Result};

/// Egress limiter settings, in bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketConfig {
    /// Burst size
    pub capacity: u64,
    /// Sustained rate
    pub refill_per_second: f64,
}

impl TokenBucketConfig {
    pub fn new(capacity: u64, refill_per_second: f64) -> Self {
        TokenBucketConfig { capacity, refill_per_second }
    }
}

/// Continuous-refill token bucket.
///
/// Tokens accumulate at `refill_per_second` up to `capacity`; the bucket
/// starts full. A request either takes all of its tokens or none.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(config: TokenBucketConfig) -> Self {
        let capacity = config.capacity as f64;
        TokenBucket {
            capacity,
            tokens: capacity,
            refill_rate: config.refill_per_second.max(0.0),
            last_refill: Instant::now(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity as u64
    }

    /// Tokens available right now
    pub fn available(&self) -> f64 {
        self.refilled(Instant::now())
    }

    /// Take `n` tokens if they are all available
    pub fn consume(&mut self, n: u64) -> bool {
        self.refill();

        let n = n as f64;
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }

    /// How long until `n` tokens are available. `None` when that can never
    /// happen, because `n` exceeds the capacity or nothing refills.
    pub fn time_until_available(&self, n: u64) -> Option<Duration> {
        let n = n as f64;
        if n > self.capacity {
            return None;
        }

        let deficit = n - self.refilled(Instant::now());
        if deficit <= 0.0 {
            return Some(Duration::ZERO);
        }
        if self.refill_rate <= 0.0 {
            return None;
        }

        // Round up so that sleeping this long is always enough
        let micros = (deficit / self.refill_rate * 1_000_000.0).ceil();
        Some(Duration::from_micros(micros as u64))
    }

    /// Wait until `n` tokens can be taken, then take them
    pub async fn acquire(&mut self, n: u64, cancel: &CancellationToken) -> Result<()> {
        loop {
            if self.consume(n) {
                return Ok(());
            }

            let Some(wait) = self.time_until_available(n) else {
                return Err(Error::config(format!(
                    "{} bytes can never pass a token bucket of capacity {}",
                    n,
                    self.capacity()
                )));
            };

            debug!("Egress limited, waiting {:?} for {} tokens", wait, n);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
    }

    fn refilled(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * self.refill_rate).min(self.capacity)
    }

    fn refill(&mut self) {
        let now = Instant::now();
        self.tokens = self.refilled(now);
        self.last_refill = now;
    }
}
