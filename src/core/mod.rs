//! Core constants, error types, and injected-dependency traits.

pub mod constants;
pub mod error;
pub mod traits;

pub use constants::*;
pub use error::{CryptoError, TransportError, VeilError};
pub use traits::{MetricsSink, NullMetrics, OsRandom, RandomSource};
