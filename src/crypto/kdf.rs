//! HKDF-SHA256 and HMAC-SHA256 primitives.
//!
//! The suite is fixed: every derivation in VEIL goes through these two
//! functions. Purpose labels keep independent derivations in disjoint
//! domains.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::core::HASH_SIZE;

type HmacSha256 = Hmac<Sha256>;

/// HKDF-Extract: compress input keying material into a pseudorandom key.
pub fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> [u8; HASH_SIZE] {
    let (prk, _) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    prk.into()
}

/// HKDF-Expand: stretch a pseudorandom key into `len` output bytes.
///
/// `len` must be at most `255 * 32`; all call sites in this crate ask for
/// far less, so an out-of-range request is a programming error.
pub fn hkdf_expand(prk: &[u8; HASH_SIZE], info: &[u8], len: usize) -> Vec<u8> {
    let hk = Hkdf::<Sha256>::from_prk(prk).expect("PRK is a valid SHA-256 output");
    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .expect("requested HKDF output length within bounds");
    okm
}

/// HMAC-SHA256 of `msg` under `key`.
pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; HASH_SIZE] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

/// Constant-time comparison of a computed MAC against received bytes.
pub fn hmac_verify(expected: &[u8; HASH_SIZE], actual: &[u8]) -> bool {
    if actual.len() != HASH_SIZE {
        return false;
    }
    // Accumulate the whole difference so the comparison does not short-circuit.
    let mut diff = 0u8;
    for (x, y) in expected.iter().zip(actual.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hkdf_expand_differs_by_info() {
        let prk = [0x11u8; HASH_SIZE];
        let first = hkdf_expand(&prk, b"a", 32);
        let second = hkdf_expand(&prk, b"b", 32);
        assert_eq!(first.len(), second.len());
        assert_ne!(first, second);
    }

    #[test]
    fn hkdf_extract_known_vector() {
        // RFC 5869 test case 1.
        let ikm = [0x0bu8; 22];
        let salt: Vec<u8> = (0x00..=0x0c).collect();
        let prk = hkdf_extract(&salt, &ikm);
        assert_eq!(
            hex::encode(prk),
            "077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5"
        );
    }

    #[test]
    fn hmac_sha256_known_vector() {
        // RFC 4231 test case 2.
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hmac_verify_accepts_and_rejects() {
        let mac = hmac_sha256(b"key", b"msg");
        assert!(hmac_verify(&mac, &mac));
        let mut tampered = mac;
        tampered[0] ^= 1;
        assert!(!hmac_verify(&mac, &tampered));
        assert!(!hmac_verify(&mac, &mac[..31]));
    }
}
