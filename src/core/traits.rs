//! Injected dependencies of the protocol core.
//!
//! The core never reaches for ambient singletons. Randomness and metrics are
//! constructor parameters; monotonic and wall-clock time are passed into each
//! time-dependent operation by the caller, which keeps every scheduling
//! decision a pure function of the supplied `now`.

use rand::rngs::OsRng;
use rand::RngCore;

/// Source of cryptographic randomness for keys, salts, and session ids.
pub trait RandomSource {
    /// Fill `buf` with random bytes.
    fn fill_bytes(&mut self, buf: &mut [u8]);

    /// Draw a random 64-bit value.
    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_be_bytes(buf)
    }
}

/// Operating-system CSPRNG, the default [`RandomSource`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&mut self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// Sink for monotonic counters the host may export.
///
/// The core also keeps its own [`TransportStats`](crate::transport::TransportStats);
/// a metrics sink lets an embedding service mirror those increments into its
/// own registry without polling.
pub trait MetricsSink {
    /// Add `by` to the named counter.
    fn increment(&self, name: &'static str, by: u64);
}

/// A [`MetricsSink`] that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetrics;

impl MetricsSink for NullMetrics {
    fn increment(&self, _name: &'static str, _by: u64) {}
}
