//! Continuous token bucket.

use std::time::{Duration, Instant};

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    /// Time until one whole token will be available (zero when admitted).
    pub retry_after: Duration,
}

impl Decision {
    pub const ADMIT: Decision = Decision {
        allowed: true,
        retry_after: Duration::ZERO,
    };

    /// Retry-After hint in whole seconds, at least 1 when denied.
    pub fn retry_after_secs(&self) -> u64 {
        if self.allowed {
            return 0;
        }
        let secs = self.retry_after.as_secs_f64().ceil();
        if secs >= u64::MAX as f64 {
            u64::MAX
        } else {
            (secs as u64).max(1)
        }
    }
}

/// Token count lives in `[0, capacity]`. `last_refill` doubles as the
/// last-access time used for idle eviction, since every check refills.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A bucket at full capacity.
    pub fn full(capacity: u32, refill_per_sec: f64, now: Instant) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            refill_per_sec,
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Refill for the time elapsed since the last access, then try to take
    /// one token. Denial leaves the token count untouched.
    pub fn try_take(&mut self, now: Instant) -> Decision {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Decision::ADMIT;
        }

        let missing = 1.0 - self.tokens;
        let retry_after = if self.refill_per_sec > 0.0 {
            Duration::try_from_secs_f64(missing / self.refill_per_sec).unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        };
        Decision {
            allowed: false,
            retry_after,
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_refill)
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).clamp(0.0, self.capacity);
        self.last_refill = self.last_refill.max(now);
    }
}
