//! Leaky-bucket admission control.
//!
//! The handshake responder uses one of these to cap how many INIT messages
//! it will process; exhaustion is a silent drop like every other handshake
//! failure.

use std::time::{Duration, Instant};

/// Token bucket refilled continuously from elapsed time.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_ms: f64,
    last_refill: Option<Instant>,
}

impl TokenBucket {
    /// A bucket holding `capacity` tokens, fully refilled every `interval`.
    pub fn new(capacity: f64, interval: Duration) -> Self {
        let interval_ms = interval.as_millis().max(1) as f64;
        Self {
            capacity,
            tokens: capacity,
            refill_per_ms: capacity / interval_ms,
            last_refill: None,
        }
    }

    /// Take one token if available. Refills from time elapsed since the last
    /// call before deciding.
    pub fn allow(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available (after refilling to `now`).
    pub fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        if let Some(last) = self.last_refill {
            let elapsed_ms = now.saturating_duration_since(last).as_millis() as f64;
            self.tokens = (self.tokens + elapsed_ms * self.refill_per_ms).min(self.capacity);
        }
        self.last_refill = Some(now);
    }
}
