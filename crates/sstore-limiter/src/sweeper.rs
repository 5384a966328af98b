//! Background sweep loop for the limiter table.

use std::sync::Arc;
use std::time::Duration;

use sstore_core::config::MAX_SWEEP_SECS;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::limiter::RateLimiter;

/// Spawn a task that calls [`RateLimiter::sweep`] every `period` until
/// `cancel` fires. The first sweep runs one full period after spawning.
///
/// `period` is clamped to [`MAX_SWEEP_SECS`] so the tick deadline cannot
/// overflow the clock.
pub fn spawn_sweeper<C: Clock>(
    limiter: Arc<RateLimiter<C>>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let period = period.min(Duration::from_secs(MAX_SWEEP_SECS));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("limiter sweeper cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let dropped = limiter.sweep();
                    debug!(dropped, remaining = limiter.len(), "limiter sweep");
                }
            }
        }
    })
}
