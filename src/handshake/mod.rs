//! PSK-bound X25519 handshake.
//!
//! Two messages over the transport's datagram substrate: INIT from the
//! initiator, RESPONSE from the responder. Both are sealed under PSK-derived
//! keys so unauthenticated observers see pseudorandom bytes, and the
//! responder answers nothing it cannot authenticate — active probes get
//! silence. A completed exchange yields a [`HandshakeSession`] on each side
//! with mirrored key schedules.

pub mod initiator;
pub mod message;
pub mod replay_cache;
pub mod responder;

use crate::core::PUBLIC_KEY_SIZE;
use crate::crypto::SessionKeys;

pub use initiator::HandshakeInitiator;
pub use replay_cache::HandshakeReplayCache;
pub use responder::{HandshakeResponder, HandshakeResult, ResponderStats};

/// Output of a completed handshake, consumed by transport-session
/// construction.
pub struct HandshakeSession {
    /// Initial protocol-level session id (rotates later).
    pub session_id: u64,
    /// Directional keys and base nonces.
    pub keys: SessionKeys,
    /// Initiator's ephemeral public key.
    pub initiator_ephemeral: [u8; PUBLIC_KEY_SIZE],
    /// Responder's ephemeral public key.
    pub responder_ephemeral: [u8; PUBLIC_KEY_SIZE],
}
