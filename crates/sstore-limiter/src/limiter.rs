use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sstore_core::config::{LimiterConfig, SweepMode};

use crate::bucket::{Decision, TokenBucket};
use crate::clock::{Clock, SystemClock};

/// Per-client token-bucket rate limiter.
///
/// Notes:
/// - Per-process only (not distributed).
/// - One mutex guards the whole table, both for checks and sweeps.
/// - Buckets are created lazily at full capacity.
pub struct RateLimiter<C: Clock = SystemClock> {
    cfg: LimiterConfig,
    clock: C,
    table: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter<SystemClock> {
    pub fn system(cfg: LimiterConfig) -> Self {
        Self::new(cfg, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn new(cfg: LimiterConfig, clock: C) -> Self {
        Self {
            cfg,
            clock,
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or deny one request for `key`.
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).allowed
    }

    /// Like [`allow`](Self::allow), also reporting when to retry after a denial.
    pub fn check(&self, key: &str) -> Decision {
        if !self.cfg.enabled {
            return Decision::ADMIT;
        }

        let now = self.clock.now();
        let mut table = self.table();
        if let Some(bucket) = table.get_mut(key) {
            return bucket.try_take(now);
        }

        let mut bucket = TokenBucket::full(self.cfg.capacity, self.cfg.refill_per_sec, now);
        let decision = bucket.try_take(now);
        table.insert(key.to_string(), bucket);
        decision
    }

    /// Run one sweep according to the configured mode. Returns the number of
    /// buckets dropped.
    pub fn sweep(&self) -> usize {
        match self.cfg.sweep_mode {
            SweepMode::Idle => self.evict_idle(Duration::from_secs(self.cfg.idle_ttl_secs)),
            SweepMode::Reset => self.reset(),
        }
    }

    /// Drop buckets not touched for longer than `ttl`; active buckets keep
    /// their token counts.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = self.clock.now();
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, bucket| bucket.idle_for(now) <= ttl);
        before - table.len()
    }

    /// Forget every client at once.
    pub fn reset(&self) -> usize {
        let mut table = self.table();
        let dropped = table.len();
        *table = HashMap::new();
        dropped
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current token count for `key`, without refilling.
    pub fn tokens(&self, key: &str) -> Option<f64> {
        self.table().get(key).map(TokenBucket::tokens)
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        // A panic mid-update cannot leave a bucket outside [0, capacity].
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
