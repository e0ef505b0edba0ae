//! Wire codec for the two handshake messages.
//!
//! Both INIT and RESPONSE are sealed under keys derived from the PSK and the
//! INIT salt, so an observer without the PSK sees sixteen random bytes
//! followed by pseudorandom ciphertext. The formats are bit-exact and stable:
//!
//! ```text
//! INIT     = salt(16) || seal(body)
//!   body   = version(1) || initiator_pk(32) || timestamp_ms(8 BE) || mac(32)
//!   mac    = HMAC(PSK, version || initiator_pk || timestamp_be || salt)
//!
//! RESPONSE = seal(body)
//!   body   = responder_pk(32) || session_id(8 BE) || timestamp_ms(8 BE)
//!            || mac(32) || confirmation(28)
//!   mac    = HMAC(PSK, responder_pk || session_id_be || timestamp_be
//!                 || initiator_pk)
//! ```
//!
//! The confirmation is a small blob sealed under a key expanded from the
//! X25519 shared secret; opening it proves the responder derived the same
//! secret without spending a transport nonce.
//!
//! Decoding failures of any kind return `None` — the caller drops silently.

use zeroize::Zeroize;

use crate::core::{
    AEAD_KEY_SIZE, AEAD_NONCE_SIZE, HASH_SIZE, INIT_BODY_SIZE, INIT_WIRE_SIZE, PROTOCOL_VERSION,
    PUBLIC_KEY_SIZE, RESPONSE_BODY_SIZE, RESPONSE_WIRE_SIZE, SALT_SIZE, SHARED_SECRET_SIZE,
    CONFIRMATION_SIZE,
};
use crate::crypto::{hkdf_expand, hkdf_extract, hmac_sha256, hmac_verify};

const CONFIRMATION_PLAINTEXT: &[u8; 12] = b"VEIL-CONF-OK";

/// Decoded INIT fields.
pub struct InitFields {
    /// Initiator's ephemeral public key.
    pub initiator_pk: [u8; PUBLIC_KEY_SIZE],
    /// Initiator's wall-clock milliseconds.
    pub timestamp_ms: u64,
    /// Random per-handshake salt.
    pub salt: [u8; SALT_SIZE],
}

/// Decoded RESPONSE fields.
pub struct ResponseFields {
    /// Responder's ephemeral public key.
    pub responder_pk: [u8; PUBLIC_KEY_SIZE],
    /// Session id allocated by the responder.
    pub session_id: u64,
    /// Responder's wall-clock milliseconds.
    pub timestamp_ms: u64,
    /// Sealed key-confirmation blob.
    pub confirmation: [u8; CONFIRMATION_SIZE],
}

// One sealing key/nonce pair expanded from the PSK-bound PRK.
fn sealing_material(psk: &[u8], salt: &[u8; SALT_SIZE], key_info: &[u8], nonce_info: &[u8])
-> ([u8; AEAD_KEY_SIZE], [u8; AEAD_NONCE_SIZE]) {
    let mut prk = hkdf_extract(salt, psk);
    let mut key = [0u8; AEAD_KEY_SIZE];
    let mut nonce = [0u8; AEAD_NONCE_SIZE];
    let mut key_okm = hkdf_expand(&prk, key_info, AEAD_KEY_SIZE);
    let mut nonce_okm = hkdf_expand(&prk, nonce_info, AEAD_NONCE_SIZE);
    key.copy_from_slice(&key_okm);
    nonce.copy_from_slice(&nonce_okm);
    key_okm.zeroize();
    nonce_okm.zeroize();
    prk.zeroize();
    (key, nonce)
}

fn init_sealing(psk: &[u8], salt: &[u8; SALT_SIZE]) -> ([u8; AEAD_KEY_SIZE], [u8; AEAD_NONCE_SIZE]) {
    sealing_material(psk, salt, b"veil-v1 init key", b"veil-v1 init nonce")
}

fn response_sealing(
    psk: &[u8],
    salt: &[u8; SALT_SIZE],
) -> ([u8; AEAD_KEY_SIZE], [u8; AEAD_NONCE_SIZE]) {
    sealing_material(psk, salt, b"veil-v1 resp key", b"veil-v1 resp nonce")
}

fn init_mac(
    psk: &[u8],
    initiator_pk: &[u8; PUBLIC_KEY_SIZE],
    timestamp_ms: u64,
    salt: &[u8; SALT_SIZE],
) -> [u8; HASH_SIZE] {
    let mut msg = Vec::with_capacity(1 + PUBLIC_KEY_SIZE + 8 + SALT_SIZE);
    msg.push(PROTOCOL_VERSION);
    msg.extend_from_slice(initiator_pk);
    msg.extend_from_slice(&timestamp_ms.to_be_bytes());
    msg.extend_from_slice(salt);
    hmac_sha256(psk, &msg)
}

fn response_mac(
    psk: &[u8],
    responder_pk: &[u8; PUBLIC_KEY_SIZE],
    session_id: u64,
    timestamp_ms: u64,
    initiator_pk: &[u8; PUBLIC_KEY_SIZE],
) -> [u8; HASH_SIZE] {
    let mut msg = Vec::with_capacity(2 * PUBLIC_KEY_SIZE + 16);
    msg.extend_from_slice(responder_pk);
    msg.extend_from_slice(&session_id.to_be_bytes());
    msg.extend_from_slice(&timestamp_ms.to_be_bytes());
    msg.extend_from_slice(initiator_pk);
    hmac_sha256(psk, &msg)
}

/// Serialize and seal an INIT.
pub fn encode_init(psk: &[u8], fields: &InitFields) -> Vec<u8> {
    let mut body = Vec::with_capacity(INIT_BODY_SIZE);
    body.push(PROTOCOL_VERSION);
    body.extend_from_slice(&fields.initiator_pk);
    body.extend_from_slice(&fields.timestamp_ms.to_be_bytes());
    body.extend_from_slice(&init_mac(psk, &fields.initiator_pk, fields.timestamp_ms, &fields.salt));

    let (mut key, nonce) = init_sealing(psk, &fields.salt);
    let sealed = crate::crypto::seal(&key, &nonce, &[], &body);
    key.zeroize();
    body.zeroize();

    let mut wire = Vec::with_capacity(INIT_WIRE_SIZE);
    wire.extend_from_slice(&fields.salt);
    wire.extend_from_slice(&sealed);
    wire
}

/// Unseal and validate an INIT. `None` on any failure.
pub fn decode_init(psk: &[u8], wire: &[u8]) -> Option<InitFields> {
    if wire.len() != INIT_WIRE_SIZE {
        return None;
    }
    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&wire[..SALT_SIZE]);

    let (mut key, nonce) = init_sealing(psk, &salt);
    let body = crate::crypto::open(&key, &nonce, &[], &wire[SALT_SIZE..]);
    key.zeroize();
    let mut body = body?;

    if body.len() != INIT_BODY_SIZE || body[0] != PROTOCOL_VERSION {
        body.zeroize();
        return None;
    }

    let mut initiator_pk = [0u8; PUBLIC_KEY_SIZE];
    initiator_pk.copy_from_slice(&body[1..33]);
    let timestamp_ms = u64::from_be_bytes(body[33..41].try_into().expect("fixed slice"));
    let expected = init_mac(psk, &initiator_pk, timestamp_ms, &salt);
    let mac_ok = hmac_verify(&expected, &body[41..73]);
    body.zeroize();

    mac_ok.then_some(InitFields { initiator_pk, timestamp_ms, salt })
}

/// Serialize and seal a RESPONSE bound to the INIT it answers.
pub fn encode_response(
    psk: &[u8],
    salt: &[u8; SALT_SIZE],
    initiator_pk: &[u8; PUBLIC_KEY_SIZE],
    fields: &ResponseFields,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(RESPONSE_BODY_SIZE);
    body.extend_from_slice(&fields.responder_pk);
    body.extend_from_slice(&fields.session_id.to_be_bytes());
    body.extend_from_slice(&fields.timestamp_ms.to_be_bytes());
    body.extend_from_slice(&response_mac(
        psk,
        &fields.responder_pk,
        fields.session_id,
        fields.timestamp_ms,
        initiator_pk,
    ));
    body.extend_from_slice(&fields.confirmation);

    let (mut key, nonce) = response_sealing(psk, salt);
    let sealed = crate::crypto::seal(&key, &nonce, &[], &body);
    key.zeroize();
    body.zeroize();
    sealed
}

/// Unseal and validate a RESPONSE against the INIT this side sent.
pub fn decode_response(
    psk: &[u8],
    salt: &[u8; SALT_SIZE],
    initiator_pk: &[u8; PUBLIC_KEY_SIZE],
    wire: &[u8],
) -> Option<ResponseFields> {
    if wire.len() != RESPONSE_WIRE_SIZE {
        return None;
    }
    let (mut key, nonce) = response_sealing(psk, salt);
    let body = crate::crypto::open(&key, &nonce, &[], wire);
    key.zeroize();
    let mut body = body?;

    if body.len() != RESPONSE_BODY_SIZE {
        body.zeroize();
        return None;
    }

    let mut responder_pk = [0u8; PUBLIC_KEY_SIZE];
    responder_pk.copy_from_slice(&body[..32]);
    let session_id = u64::from_be_bytes(body[32..40].try_into().expect("fixed slice"));
    let timestamp_ms = u64::from_be_bytes(body[40..48].try_into().expect("fixed slice"));
    let expected = response_mac(psk, &responder_pk, session_id, timestamp_ms, initiator_pk);
    let mac_ok = hmac_verify(&expected, &body[48..80]);
    let mut confirmation = [0u8; CONFIRMATION_SIZE];
    confirmation.copy_from_slice(&body[80..]);
    body.zeroize();

    mac_ok.then_some(ResponseFields { responder_pk, session_id, timestamp_ms, confirmation })
}

/// Seal the key-confirmation blob under material expanded from the shared
/// secret.
pub fn build_confirmation(
    shared_secret: &[u8; SHARED_SECRET_SIZE],
    salt: &[u8; SALT_SIZE],
    session_id: u64,
) -> [u8; CONFIRMATION_SIZE] {
    let (mut key, nonce) =
        sealing_material(shared_secret, salt, b"veil-v1 confirm key", b"veil-v1 confirm nonce");
    let sealed = crate::crypto::seal(&key, &nonce, &session_id.to_be_bytes(), CONFIRMATION_PLAINTEXT);
    key.zeroize();
    let mut out = [0u8; CONFIRMATION_SIZE];
    out.copy_from_slice(&sealed);
    out
}

/// Verify the responder's key confirmation.
pub fn verify_confirmation(
    shared_secret: &[u8; SHARED_SECRET_SIZE],
    salt: &[u8; SALT_SIZE],
    session_id: u64,
    confirmation: &[u8; CONFIRMATION_SIZE],
) -> bool {
    let (mut key, nonce) =
        sealing_material(shared_secret, salt, b"veil-v1 confirm key", b"veil-v1 confirm nonce");
    let opened = crate::crypto::open(&key, &nonce, &session_id.to_be_bytes(), confirmation);
    key.zeroize();
    matches!(opened.as_deref(), Some(plain) if plain == CONFIRMATION_PLAINTEXT)
}
