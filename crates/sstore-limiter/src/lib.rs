//! sstore-limiter: per-client token-bucket admission control
//!
//! Each client key owns a continuous token bucket (capacity `C`, refill `R`
//! tokens/second). A request is admitted when at least one whole token is
//! available; denial never consumes tokens.
//!
//! The whole table sits behind one mutex. A background sweeper either evicts
//! buckets idle past a TTL (default) or drops the whole table at once.

pub mod bucket;
pub mod clock;
pub mod limiter;
pub mod sweeper;

pub use bucket::{Decision, TokenBucket};
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::RateLimiter;
pub use sweeper::spawn_sweeper;
