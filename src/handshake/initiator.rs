//! Initiator side of the handshake.

use std::time::Duration;

use zeroize::Zeroizing;

use crate::core::{PUBLIC_KEY_SIZE, RandomSource, SALT_SIZE};
use crate::crypto::{EphemeralKeypair, Role, derive_session_keys};
use crate::handshake::HandshakeSession;
use crate::handshake::message::{self, InitFields};

/// Drives one handshake attempt from the client side.
///
/// Create, call [`create_init`](Self::create_init), send the bytes, feed the
/// peer's reply to [`consume_response`](Self::consume_response). The state
/// machine is single-shot: a successful response consumes the ephemeral key.
pub struct HandshakeInitiator {
    psk: Zeroizing<Vec<u8>>,
    skew_tolerance: Duration,
    rng: Box<dyn RandomSource>,
    ephemeral: Option<EphemeralKeypair>,
    salt: [u8; SALT_SIZE],
    init_sent: bool,
}

impl HandshakeInitiator {
    /// A fresh initiator bound to the shared PSK.
    pub fn new(psk: Vec<u8>, skew_tolerance: Duration, rng: Box<dyn RandomSource>) -> Self {
        Self {
            psk: Zeroizing::new(psk),
            skew_tolerance,
            rng,
            ephemeral: None,
            salt: [0u8; SALT_SIZE],
            init_sent: false,
        }
    }

    /// Build the INIT message. `now_ms` is wall-clock milliseconds.
    ///
    /// Calling again discards the previous attempt and starts over with a
    /// fresh ephemeral key and salt.
    pub fn create_init(&mut self, now_ms: u64) -> Vec<u8> {
        let ephemeral = EphemeralKeypair::generate(self.rng.as_mut());
        self.rng.fill_bytes(&mut self.salt);

        let fields = InitFields {
            initiator_pk: ephemeral.public_bytes(),
            timestamp_ms: now_ms,
            salt: self.salt,
        };
        let wire = message::encode_init(&self.psk, &fields);

        self.ephemeral = Some(ephemeral);
        self.init_sent = true;
        wire
    }

    /// Validate a RESPONSE and derive the session. `None` on any failure.
    pub fn consume_response(&mut self, wire: &[u8], now_ms: u64) -> Option<HandshakeSession> {
        if !self.init_sent {
            return None;
        }
        let initiator_pk = self.ephemeral.as_ref()?.public_bytes();
        let fields = message::decode_response(&self.psk, &self.salt, &initiator_pk, wire)?;

        if now_ms.abs_diff(fields.timestamp_ms) > self.skew_tolerance.as_millis() as u64 {
            tracing::debug!("handshake response outside skew tolerance, dropping");
            return None;
        }

        // Take the ephemeral so a second response cannot re-derive keys.
        let ephemeral = self.ephemeral.take()?;
        self.init_sent = false;
        let shared = Zeroizing::new(ephemeral.shared_secret(&fields.responder_pk));

        if !message::verify_confirmation(&shared, &self.salt, fields.session_id, &fields.confirmation)
        {
            tracing::debug!("handshake key confirmation failed, dropping");
            return None;
        }

        let keys = derive_session_keys(&shared, &self.salt, fields.session_id, Role::Initiator);
        Some(HandshakeSession {
            session_id: fields.session_id,
            keys,
            initiator_ephemeral: initiator_pk,
            responder_ephemeral: fields.responder_pk,
        })
    }

    /// Public key of the in-flight attempt, if any.
    pub fn ephemeral_public(&self) -> Option<[u8; PUBLIC_KEY_SIZE]> {
        self.ephemeral.as_ref().map(EphemeralKeypair::public_bytes)
    }
}
