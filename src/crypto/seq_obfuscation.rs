//! Keyed permutation over wire-visible sequence numbers.
//!
//! A passive observer correlating packets by their monotonically increasing
//! sequence field defeats session-id rotation. Before serialization the
//! sequence is run through a small keyed permutation so consecutive inputs
//! map to unrelated-looking outputs; the receiver inverts it before the
//! replay check.
//!
//! The permutation is a 4-round Feistel network over the 64-bit value with
//! 32-bit halves. Round keys come from HMAC-SHA256 of the obfuscation key;
//! the round function is the leading 4 bytes of HMAC-SHA256 of the half
//! under the round key. Feistel structure makes the map invertible for any
//! round function, and the HMAC rounds remove any small linear relation
//! between neighbouring inputs.

use zeroize::Zeroize;

use crate::core::{AEAD_KEY_SIZE, AEAD_NONCE_SIZE, HASH_SIZE};
use crate::crypto::kdf::{hkdf_expand, hkdf_extract, hmac_sha256};

const ROUNDS: usize = 4;
const SEQ_OBF_INFO: &[u8] = b"veil-v1 seq-obf";

/// Key for the sequence permutation, derived per direction.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SeqObfuscationKey {
    round_keys: [[u8; HASH_SIZE]; ROUNDS],
}

/// Derive a [`SeqObfuscationKey`] from a session key and its base nonce.
///
/// Both directions derive independently (send key + send base nonce on the
/// sender equals recv key + recv base nonce on the receiver), so the pair of
/// keys on one side mirrors the pair on the other.
pub fn derive_seq_obfuscation_key(
    session_key: &[u8; AEAD_KEY_SIZE],
    base_nonce: &[u8; AEAD_NONCE_SIZE],
) -> SeqObfuscationKey {
    let mut prk = hkdf_extract(base_nonce, session_key);
    let mut okm = hkdf_expand(&prk, SEQ_OBF_INFO, AEAD_KEY_SIZE);
    prk.zeroize();

    let mut master = [0u8; AEAD_KEY_SIZE];
    master.copy_from_slice(&okm);
    okm.zeroize();

    let mut round_keys = [[0u8; HASH_SIZE]; ROUNDS];
    for (i, rk) in round_keys.iter_mut().enumerate() {
        *rk = hmac_sha256(&master, &[i as u8]);
    }
    master.zeroize();

    SeqObfuscationKey { round_keys }
}

fn round(half: u32, round_key: &[u8; HASH_SIZE]) -> u32 {
    let mac = hmac_sha256(round_key, &half.to_be_bytes());
    u32::from_be_bytes([mac[0], mac[1], mac[2], mac[3]])
}

/// Permute a sequence number for the wire.
pub fn obfuscate_sequence(seq: u64, key: &SeqObfuscationKey) -> u64 {
    let mut left = (seq >> 32) as u32;
    let mut right = seq as u32;
    for rk in &key.round_keys {
        let next = left ^ round(right, rk);
        left = right;
        right = next;
    }
    ((left as u64) << 32) | right as u64
}

/// Invert [`obfuscate_sequence`].
pub fn deobfuscate_sequence(wire_seq: u64, key: &SeqObfuscationKey) -> u64 {
    let mut left = (wire_seq >> 32) as u32;
    let mut right = wire_seq as u32;
    for rk in key.round_keys.iter().rev() {
        let prev = right ^ round(left, rk);
        right = left;
        left = prev;
    }
    ((left as u64) << 32) | right as u64
}
