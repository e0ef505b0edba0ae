//! Supporting utilities: scheduling, admission control, and debug checks.

pub mod advanced_limiter;
pub mod thread_check;
pub mod timer_heap;
pub mod token_bucket;

pub use advanced_limiter::{
    AdvancedRateLimiter, BurstTokenBucket, GlobalRateStats, PeerRateLimiter, PeerRateStats,
    RateLimiterConfig, TrafficPriority,
};
pub use thread_check::ThreadChecker;
pub use timer_heap::{TimerHeap, TimerId};
pub use token_bucket::TokenBucket;
