//! Error types for the VEIL protocol core.
//!
//! Only conditions the caller can act on become errors. Parse failures,
//! authentication failures, replays, stale timestamps, and rate-limit hits
//! are silent drops by design: they surface as `None`/`false` returns plus a
//! statistics counter, never as a distinguishable error channel.

use thiserror::Error;

/// Errors in the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD encryption failed.
    #[error("AEAD encryption failed")]
    EncryptionFailed,

    /// Key derivation produced an invalid length.
    #[error("key derivation failed")]
    KeyDerivationFailed,

    /// Nonce counter exhausted - session must terminate.
    #[error("nonce counter exhausted - session must terminate")]
    CounterExhaustion,
}

/// Resource-exhaustion results from the transport layer.
///
/// These are category-two failures: the operation did not happen, the
/// session remains usable.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Plaintext exceeds what a single packet can carry even after
    /// fragmentation limits.
    #[error("payload too large for packet format")]
    PayloadTooLarge,

    /// The retransmit buffer byte budget rejected the send.
    #[error("retransmit buffer full")]
    RetransmitBufferFull,

    /// The send sequence space is exhausted.
    #[error("send sequence exhausted")]
    SequenceExhausted,

    /// Too many frames for one packet.
    #[error("frame count overflow")]
    FrameCountOverflow,
}

/// Top-level VEIL errors.
#[derive(Debug, Error)]
pub enum VeilError {
    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
