//! X25519 key material and session-key derivation.
//!
//! All secret buffers zeroize on drop. `SessionKeys` is deliberately not
//! `Clone`: exactly one transport session owns the keys, and moving the
//! session is the only way to move them.

use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::{
    AEAD_KEY_SIZE, AEAD_NONCE_SIZE, PUBLIC_KEY_SIZE, RandomSource, SALT_SIZE, SHARED_SECRET_SIZE,
};
use crate::crypto::kdf::{hkdf_expand, hkdf_extract};

/// Purpose label for the session key schedule.
const SESSION_KEYS_INFO: &[u8] = b"veil-v1 session keys";

/// An ephemeral X25519 keypair, used for exactly one handshake.
pub struct EphemeralKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl EphemeralKeypair {
    /// Generate a fresh keypair from the injected randomness source.
    pub fn generate(rng: &mut dyn RandomSource) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let secret = StaticSecret::from(seed);
        seed.zeroize();
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The public half, safe to put on the wire.
    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        *self.public.as_bytes()
    }

    /// Compute the X25519 shared secret with a peer public key.
    pub fn shared_secret(&self, peer_public: &[u8; PUBLIC_KEY_SIZE]) -> [u8; SHARED_SECRET_SIZE] {
        let peer = PublicKey::from(*peer_public);
        *self.secret.diffie_hellman(&peer).as_bytes()
    }
}

/// The four per-session secrets produced by key derivation.
///
/// Each direction has its own key and base nonce; `send_*` on one side
/// equals `recv_*` on the other. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    /// Key sealing our outbound packets.
    pub(crate) send_key: [u8; AEAD_KEY_SIZE],
    /// Key opening the peer's packets.
    pub(crate) recv_key: [u8; AEAD_KEY_SIZE],
    /// Base nonce for outbound nonce derivation.
    pub(crate) send_base_nonce: [u8; AEAD_NONCE_SIZE],
    /// Base nonce for inbound nonce derivation.
    pub(crate) recv_base_nonce: [u8; AEAD_NONCE_SIZE],
}

impl SessionKeys {
    /// Construct from raw parts. Intended for key derivation and tests.
    pub fn from_parts(
        send_key: [u8; AEAD_KEY_SIZE],
        recv_key: [u8; AEAD_KEY_SIZE],
        send_base_nonce: [u8; AEAD_NONCE_SIZE],
        recv_base_nonce: [u8; AEAD_NONCE_SIZE],
    ) -> Self {
        Self { send_key, recv_key, send_base_nonce, recv_base_nonce }
    }

    /// Outbound sealing key.
    pub fn send_key(&self) -> &[u8; AEAD_KEY_SIZE] {
        &self.send_key
    }

    /// Inbound opening key.
    pub fn recv_key(&self) -> &[u8; AEAD_KEY_SIZE] {
        &self.recv_key
    }

    /// Outbound base nonce.
    pub fn send_base_nonce(&self) -> &[u8; AEAD_NONCE_SIZE] {
        &self.send_base_nonce
    }

    /// Inbound base nonce.
    pub fn recv_base_nonce(&self) -> &[u8; AEAD_NONCE_SIZE] {
        &self.recv_base_nonce
    }
}

/// Which end of the handshake this party played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sent the INIT.
    Initiator,
    /// Answered with the RESPONSE.
    Responder,
}

/// Derive the session key schedule shared by both handshake roles.
///
/// `prk = HKDF-Extract(salt, shared_secret)`, then 88 bytes are expanded
/// under a purpose label bound to the session id and split into
/// `initiator_send_key | responder_send_key | initiator_base_nonce |
/// responder_base_nonce`. Each role takes its own send half and the peer's
/// half for receive, so the two sides come out mirrored.
pub fn derive_session_keys(
    shared_secret: &[u8; SHARED_SECRET_SIZE],
    salt: &[u8; SALT_SIZE],
    session_id: u64,
    role: Role,
) -> SessionKeys {
    let mut prk = hkdf_extract(salt, shared_secret);

    let mut info = Vec::with_capacity(SESSION_KEYS_INFO.len() + 8);
    info.extend_from_slice(SESSION_KEYS_INFO);
    info.extend_from_slice(&session_id.to_be_bytes());

    let mut okm = hkdf_expand(&prk, &info, 2 * AEAD_KEY_SIZE + 2 * AEAD_NONCE_SIZE);
    prk.zeroize();

    let mut initiator_key = [0u8; AEAD_KEY_SIZE];
    let mut responder_key = [0u8; AEAD_KEY_SIZE];
    let mut initiator_nonce = [0u8; AEAD_NONCE_SIZE];
    let mut responder_nonce = [0u8; AEAD_NONCE_SIZE];
    initiator_key.copy_from_slice(&okm[..32]);
    responder_key.copy_from_slice(&okm[32..64]);
    initiator_nonce.copy_from_slice(&okm[64..76]);
    responder_nonce.copy_from_slice(&okm[76..88]);
    okm.zeroize();

    let keys = match role {
        Role::Initiator => {
            SessionKeys::from_parts(initiator_key, responder_key, initiator_nonce, responder_nonce)
        }
        Role::Responder => {
            SessionKeys::from_parts(responder_key, initiator_key, responder_nonce, initiator_nonce)
        }
    };

    initiator_key.zeroize();
    responder_key.zeroize();
    initiator_nonce.zeroize();
    responder_nonce.zeroize();

    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OsRandom;

    #[test]
    fn keypair_generation_produces_distinct_keys() {
        let mut rng = OsRandom;
        let a = EphemeralKeypair::generate(&mut rng);
        let b = EphemeralKeypair::generate(&mut rng);
        assert_ne!(a.public_bytes(), b.public_bytes());
    }

    #[test]
    fn shared_secret_agrees() {
        let mut rng = OsRandom;
        let a = EphemeralKeypair::generate(&mut rng);
        let b = EphemeralKeypair::generate(&mut rng);
        assert_eq!(a.shared_secret(&b.public_bytes()), b.shared_secret(&a.public_bytes()));
    }

    #[test]
    fn session_keys_align_between_peers() {
        let mut rng = OsRandom;
        let a = EphemeralKeypair::generate(&mut rng);
        let b = EphemeralKeypair::generate(&mut rng);
        let mut salt = [0u8; SALT_SIZE];
        rng.fill_bytes(&mut salt);

        let ss_a = a.shared_secret(&b.public_bytes());
        let ss_b = b.shared_secret(&a.public_bytes());

        let initiator = derive_session_keys(&ss_a, &salt, 0x0102030405060708, Role::Initiator);
        let responder = derive_session_keys(&ss_b, &salt, 0x0102030405060708, Role::Responder);

        assert_eq!(initiator.send_key(), responder.recv_key());
        assert_eq!(initiator.recv_key(), responder.send_key());
        assert_eq!(initiator.send_base_nonce(), responder.recv_base_nonce());
        assert_eq!(initiator.recv_base_nonce(), responder.send_base_nonce());
    }

    #[test]
    fn session_keys_differ_by_session_id() {
        let ss = [0x55u8; SHARED_SECRET_SIZE];
        let salt = [0x66u8; SALT_SIZE];
        let first = derive_session_keys(&ss, &salt, 1, Role::Initiator);
        let second = derive_session_keys(&ss, &salt, 2, Role::Initiator);
        assert_ne!(first.send_key(), second.send_key());
    }
}
