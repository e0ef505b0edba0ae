//! # VEIL Protocol
//!
//! VEIL is a user-space VPN core: authenticated encrypted tunnels between
//! clients and a central server over an unreliable datagram substrate, with
//! traffic shaping that makes tunnel packets hard to tell apart from
//! legitimate background flows. It provides:
//!
//! - **Security**: PSK-bound X25519 handshake, ChaCha20-Poly1305 transport,
//!   replay protection, silent failure toward active probes
//! - **Reliability**: selective ACKs, RTT-estimated retransmission,
//!   fragmentation and reassembly, per-stream in-order delivery
//! - **Stealth**: deterministic padding and prefixes, sequence-number
//!   permutation, cover-traffic heartbeats mimicking real protocols
//! - **Simplicity**: fixed cryptographic suite, no negotiation
//!
//! ## Modules
//!
//! - [`core`]: constants, error types, injected-dependency traits
//! - [`crypto`]: AEAD, HKDF/HMAC, X25519, sequence permutation
//! - [`obfuscation`]: PRF-driven shaping profile and heartbeat payloads
//! - [`handshake`]: INIT/RESPONSE exchange, replay cache, rate limiting
//! - [`transport`]: packet/mux codecs, reliability primitives, the session
//! - [`util`]: timer heap, token bucket, debug ownership checker
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use veil_protocol::core::OsRandom;
//! use veil_protocol::handshake::{HandshakeInitiator, HandshakeResponder};
//! use veil_protocol::transport::{TransportConfig, TransportSession};
//! use veil_protocol::util::TokenBucket;
//!
//! let psk = vec![0xAB; 32];
//! let skew = Duration::from_millis(200);
//!
//! // Handshake: one INIT, one RESPONSE, mirrored keys on both ends.
//! let mut initiator = HandshakeInitiator::new(psk.clone(), skew, Box::new(OsRandom));
//! let mut responder = HandshakeResponder::new(
//!     psk,
//!     skew,
//!     TokenBucket::new(100.0, Duration::from_millis(10)),
//!     Box::new(OsRandom),
//! );
//!
//! let now_ms = 1_700_000_000_000;
//! let init = initiator.create_init(now_ms);
//! let result = responder.handle_init(&init, now_ms, Instant::now()).expect("valid INIT");
//! let session = initiator.consume_response(&result.response, now_ms).expect("valid RESPONSE");
//!
//! // Transport: the caller owns the socket and the clock.
//! let now = Instant::now();
//! let mut client = TransportSession::new(session, TransportConfig::default(), now);
//! let mut server = TransportSession::new(result.session, TransportConfig::default(), now);
//!
//! let datagrams = client.encrypt_data(b"ip packet", 0, false, now).expect("sealed");
//! for datagram in &datagrams {
//!     let frames = server.decrypt_packet(datagram, now).expect("opened");
//!     assert!(!frames.is_empty());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod core;
pub mod crypto;
pub mod handshake;
pub mod obfuscation;
pub mod transport;
pub mod util;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{
        CryptoError, MetricsSink, NullMetrics, OsRandom, RandomSource, TransportError, VeilError,
    };
    pub use crate::crypto::SessionKeys;
    pub use crate::handshake::{
        HandshakeInitiator, HandshakeReplayCache, HandshakeResponder, HandshakeResult,
        HandshakeSession,
    };
    pub use crate::obfuscation::{
        HeartbeatPayloadKind, HeartbeatTimingModel, JitterModel, ObfuscationProfile,
        PaddingDistribution,
    };
    pub use crate::transport::{
        AckFrame, DataFrame, MuxFrame, TransportConfig, TransportSession, TransportStats,
    };
    pub use crate::util::{ThreadChecker, TimerHeap, TimerId, TokenBucket};
}

// Re-export commonly used items at crate root
pub use crate::core::{CryptoError, TransportError, VeilError};
pub use handshake::{HandshakeInitiator, HandshakeResponder, HandshakeSession};
pub use transport::{TransportConfig, TransportSession, TransportStats};
