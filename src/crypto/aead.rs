//! ChaCha20-Poly1305 sealing and nonce derivation.
//!
//! Per-packet nonces are derived by XORing a monotonic counter into a fixed
//! per-direction base nonce. A counter value is consumed by at most one seal
//! under a given key; the transport session enforces this by never resetting
//! its send sequence.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};

use crate::core::{AEAD_KEY_SIZE, AEAD_NONCE_SIZE, AEAD_TAG_SIZE};

/// Seal `plaintext` under `key`/`nonce`, authenticating `aad`.
///
/// Output is ciphertext plus the 16-byte Poly1305 tag.
pub fn seal(
    key: &[u8; AEAD_KEY_SIZE],
    nonce: &[u8; AEAD_NONCE_SIZE],
    aad: &[u8],
    plaintext: &[u8],
) -> Vec<u8> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .expect("ChaCha20-Poly1305 encryption is infallible for in-range lengths")
}

/// Open a sealed buffer. Returns `None` on any authentication failure.
///
/// The tag comparison inside the cipher is constant-time; only the length
/// check branches on public data.
pub fn open(
    key: &[u8; AEAD_KEY_SIZE],
    nonce: &[u8; AEAD_NONCE_SIZE],
    aad: &[u8],
    ciphertext: &[u8],
) -> Option<Vec<u8>> {
    if ciphertext.len() < AEAD_TAG_SIZE {
        return None;
    }
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .ok()
}

/// Derive the per-packet nonce from a base nonce and a counter.
///
/// The 8-byte little-endian counter is XORed into the low 8 bytes of the
/// base nonce; the high 4 bytes pass through unchanged.
pub fn derive_nonce(base: &[u8; AEAD_NONCE_SIZE], counter: u64) -> [u8; AEAD_NONCE_SIZE] {
    let mut nonce = *base;
    for (b, c) in nonce.iter_mut().zip(counter.to_le_bytes()) {
        *b ^= c;
    }
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let key = [0x42u8; AEAD_KEY_SIZE];
        let base = [0x07u8; AEAD_NONCE_SIZE];
        let nonce = derive_nonce(&base, 1);
        let aad = b"meta";
        let msg = b"payload";

        let sealed = seal(&key, &nonce, aad, msg);
        assert_eq!(sealed.len(), msg.len() + AEAD_TAG_SIZE);

        let opened = open(&key, &nonce, aad, &sealed).expect("authentic ciphertext opens");
        assert_eq!(opened, msg);
    }

    #[test]
    fn open_rejects_tampered_ciphertext() {
        let key = [0x42u8; AEAD_KEY_SIZE];
        let nonce = derive_nonce(&[0u8; AEAD_NONCE_SIZE], 5);
        let mut sealed = seal(&key, &nonce, b"meta", b"payload");
        sealed[0] ^= 0x01;
        assert!(open(&key, &nonce, b"meta", &sealed).is_none());
    }

    #[test]
    fn open_rejects_wrong_aad() {
        let key = [0x42u8; AEAD_KEY_SIZE];
        let nonce = derive_nonce(&[0u8; AEAD_NONCE_SIZE], 5);
        let sealed = seal(&key, &nonce, b"meta", b"payload");
        assert!(open(&key, &nonce, b"other", &sealed).is_none());
    }

    #[test]
    fn open_rejects_short_input() {
        let key = [0u8; AEAD_KEY_SIZE];
        let nonce = [0u8; AEAD_NONCE_SIZE];
        assert!(open(&key, &nonce, b"", &[0u8; 8]).is_none());
    }

    #[test]
    fn derive_nonce_xors_counter_little_endian() {
        let base = [0u8; AEAD_NONCE_SIZE];
        let nonce = derive_nonce(&base, 0x0102030405060708);
        assert_eq!(&nonce[..8], &0x0102030405060708u64.to_le_bytes());
        assert_eq!(&nonce[8..], &[0u8; 4]);
    }

    #[test]
    fn derive_nonce_distinct_per_counter() {
        let base = [0xAAu8; AEAD_NONCE_SIZE];
        assert_ne!(derive_nonce(&base, 0), derive_nonce(&base, 1));
        assert_eq!(derive_nonce(&base, 7), derive_nonce(&base, 7));
    }
}
