//! Traffic shaping: deterministic padding, pre-header prefixes, timing
//! jitter, and cover-traffic heartbeats.
//!
//! Everything here is driven by a seeded PRF shared by both tunnel ends, so
//! the receiver can reconstruct any shaping decision the sender made without
//! extra bytes on the wire.

pub mod heartbeat;
pub mod prf;
pub mod profile;

pub use heartbeat::{HeartbeatPayloadKind, generate_heartbeat_payload};
pub use prf::{PrfStream, prf_block, prf_draw};
pub use profile::{
    HeartbeatTimingModel, JitterModel, ObfuscationProfile, PaddingDistribution, SizeClass,
    compute_heartbeat_interval, compute_padding_size, compute_prefix_size, compute_timing_jitter,
    generate_profile_seed, padding_bytes, prefix_bytes,
};
