//! Cryptographic primitives: AEAD, HKDF/HMAC, X25519, and the sequence
//! permutation used for DPI resistance.
//!
//! The suite is fixed (X25519, HKDF-SHA256, ChaCha20-Poly1305); there is no
//! negotiation anywhere in the protocol.

pub mod aead;
pub mod kdf;
pub mod keys;
pub mod seq_obfuscation;

pub use aead::{derive_nonce, open, seal};
pub use kdf::{hkdf_expand, hkdf_extract, hmac_sha256, hmac_verify};
pub use keys::{EphemeralKeypair, Role, SessionKeys, derive_session_keys};
pub use seq_obfuscation::{
    SeqObfuscationKey, deobfuscate_sequence, derive_seq_obfuscation_key, obfuscate_sequence,
};
