//! Responder side of the handshake.
//!
//! Every check failure is a silent drop: the only externally observable
//! behavior of a responder is a RESPONSE to a valid INIT. Probes with bad
//! MACs, stale timestamps, replays, or rate-limited bursts all look
//! identical — nothing comes back.

use std::time::{Duration, Instant};

use zeroize::Zeroizing;

use crate::core::RandomSource;
use crate::crypto::{EphemeralKeypair, Role, derive_session_keys};
use crate::handshake::HandshakeSession;
use crate::handshake::message::{self, ResponseFields};
use crate::handshake::replay_cache::HandshakeReplayCache;
use crate::util::TokenBucket;

/// Outcome of a successfully admitted INIT.
pub struct HandshakeResult {
    /// RESPONSE bytes to send back over the same substrate.
    pub response: Vec<u8>,
    /// The completed session, ready to construct a transport session.
    pub session: HandshakeSession,
}

/// Counters for the silent-drop taxonomy, for operator dashboards.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponderStats {
    /// INITs answered with a RESPONSE.
    pub accepted: u64,
    /// Undecodable or MAC-invalid INITs.
    pub dropped_invalid: u64,
    /// Timestamps outside the skew tolerance.
    pub dropped_skew: u64,
    /// Replay-cache hits.
    pub dropped_replay: u64,
    /// Token-bucket exhaustion.
    pub dropped_rate_limited: u64,
}

/// Accepts INIT messages and produces sessions.
pub struct HandshakeResponder {
    psk: Zeroizing<Vec<u8>>,
    skew_tolerance: Duration,
    rate_limiter: TokenBucket,
    replay_cache: HandshakeReplayCache,
    rng: Box<dyn RandomSource>,
    stats: ResponderStats,
}

impl HandshakeResponder {
    /// A responder bound to the shared PSK with the given admission policy.
    pub fn new(
        psk: Vec<u8>,
        skew_tolerance: Duration,
        rate_limiter: TokenBucket,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            psk: Zeroizing::new(psk),
            skew_tolerance,
            rate_limiter,
            replay_cache: HandshakeReplayCache::default(),
            rng,
            stats: ResponderStats::default(),
        }
    }

    /// Replace the default replay cache (capacity/window tuning).
    pub fn with_replay_cache(mut self, cache: HandshakeReplayCache) -> Self {
        self.replay_cache = cache;
        self
    }

    /// Process one INIT. `now_ms` is wall-clock milliseconds, `now` is the
    /// monotonic instant for the rate limiter. `None` means silent drop.
    pub fn handle_init(
        &mut self,
        wire: &[u8],
        now_ms: u64,
        now: Instant,
    ) -> Option<HandshakeResult> {
        let Some(init) = message::decode_init(&self.psk, wire) else {
            self.stats.dropped_invalid += 1;
            tracing::trace!("handshake init failed authentication, dropping");
            return None;
        };

        if now_ms.abs_diff(init.timestamp_ms) > self.skew_tolerance.as_millis() as u64 {
            self.stats.dropped_skew += 1;
            tracing::debug!("handshake init outside skew tolerance, dropping");
            return None;
        }

        if self.replay_cache.mark_and_check(init.timestamp_ms, &init.initiator_pk, now_ms) {
            self.stats.dropped_replay += 1;
            tracing::debug!("handshake init replay detected, dropping");
            return None;
        }

        if !self.rate_limiter.allow(now) {
            self.stats.dropped_rate_limited += 1;
            tracing::debug!("handshake init rate limited, dropping");
            return None;
        }

        let ephemeral = EphemeralKeypair::generate(self.rng.as_mut());
        let responder_pk = ephemeral.public_bytes();
        let shared = Zeroizing::new(ephemeral.shared_secret(&init.initiator_pk));
        let session_id = self.rng.next_u64();

        let confirmation = message::build_confirmation(&shared, &init.salt, session_id);
        let keys = derive_session_keys(&shared, &init.salt, session_id, Role::Responder);

        let fields = ResponseFields {
            responder_pk,
            session_id,
            timestamp_ms: now_ms,
            confirmation,
        };
        let response = message::encode_response(&self.psk, &init.salt, &init.initiator_pk, &fields);

        self.stats.accepted += 1;
        Some(HandshakeResult {
            response,
            session: HandshakeSession {
                session_id,
                keys,
                initiator_ephemeral: init.initiator_pk,
                responder_ephemeral: responder_pk,
            },
        })
    }

    /// Silent-drop counters.
    pub fn stats(&self) -> ResponderStats {
        self.stats
    }
}
