//! Packet-shaping profile and its deterministic derivations.
//!
//! A profile fixes how tunnel traffic is molded to resemble a chosen cover:
//! how much pre-header filler each packet carries, how much padding rides
//! inside the sealed area, how sends are jittered in time, and how often
//! heartbeats fire. All derivations are pure in `(seed, sequence)`, so the
//! same packet is always shaped the same way and the receiving side can
//! reconstruct the sender's choices.

use std::time::Duration;

use crate::core::{PROFILE_SEED_SIZE, RandomSource};
use crate::obfuscation::heartbeat::HeartbeatPayloadKind;
use crate::obfuscation::prf::{PrfStream, prf_draw};

/// A padding size class for the weighted distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClass {
    /// Relative weight of this class.
    pub weight: u32,
    /// Smallest padding size in the class.
    pub min: usize,
    /// Largest padding size in the class.
    pub max: usize,
}

/// How padding sizes are distributed across packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingDistribution {
    /// Uniform over `[min_padding, max_padding]`.
    Uniform,
    /// Weighted choice of a small/medium/large class, then uniform within it.
    Weighted([SizeClass; 3]),
}

/// Timing-jitter shape applied to outgoing packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterModel {
    /// Uniform over `[0, max_jitter]`.
    Uniform,
    /// Poisson event count scaled into the jitter range.
    PoissonLike,
    /// Exponentially distributed, capped at `max_jitter`.
    Exponential,
}

/// Distribution of the gaps between heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatTimingModel {
    /// Uniform over `[heartbeat_min, heartbeat_max]`.
    Uniform,
    /// Exponential gaps clamped into the bounds, like sensor check-ins.
    Exponential,
    /// Mostly short gaps with occasional long silences.
    Burst,
}

/// Traffic-shaping parameters shared by both tunnel ends.
#[derive(Debug, Clone)]
pub struct ObfuscationProfile {
    /// Master switch; when false every derivation returns zero/empty.
    pub enabled: bool,
    /// PRF seed, at least 16 bytes of entropy; exchanged out of band.
    pub seed: [u8; PROFILE_SEED_SIZE],
    /// Smallest in-packet padding.
    pub min_padding: usize,
    /// Largest in-packet padding.
    pub max_padding: usize,
    /// Smallest pre-header prefix.
    pub min_prefix: usize,
    /// Largest pre-header prefix.
    pub max_prefix: usize,
    /// Padding size distribution.
    pub padding_distribution: PaddingDistribution,
    /// Timing-jitter shape.
    pub jitter_model: JitterModel,
    /// Whether send jitter is applied at all.
    pub timing_jitter_enabled: bool,
    /// Upper bound on send jitter.
    pub max_jitter: Duration,
    /// Mean parameter for the Poisson/exponential jitter shapes.
    pub jitter_scale: f64,
    /// Heartbeat gap distribution.
    pub heartbeat_model: HeartbeatTimingModel,
    /// Heartbeat payload mimic.
    pub heartbeat_payload: HeartbeatPayloadKind,
    /// Shortest heartbeat gap.
    pub heartbeat_min: Duration,
    /// Longest heartbeat gap.
    pub heartbeat_max: Duration,
}

impl Default for ObfuscationProfile {
    fn default() -> Self {
        Self {
            enabled: false,
            seed: [0u8; PROFILE_SEED_SIZE],
            min_padding: 0,
            max_padding: 64,
            min_prefix: 0,
            max_prefix: 16,
            padding_distribution: PaddingDistribution::Uniform,
            jitter_model: JitterModel::Uniform,
            timing_jitter_enabled: false,
            max_jitter: Duration::from_millis(50),
            jitter_scale: 3.0,
            heartbeat_model: HeartbeatTimingModel::Uniform,
            heartbeat_payload: HeartbeatPayloadKind::Timestamp,
            heartbeat_min: Duration::from_secs(5),
            heartbeat_max: Duration::from_secs(15),
        }
    }
}

impl ObfuscationProfile {
    /// An enabled profile with the given seed and the default bounds.
    pub fn with_seed(seed: [u8; PROFILE_SEED_SIZE]) -> Self {
        Self { enabled: true, seed, ..Self::default() }
    }
}

/// Draw a fresh random profile seed.
pub fn generate_profile_seed(rng: &mut dyn RandomSource) -> [u8; PROFILE_SEED_SIZE] {
    let mut seed = [0u8; PROFILE_SEED_SIZE];
    rng.fill_bytes(&mut seed);
    seed
}

/// Deterministic pre-header prefix size for a packet sequence.
pub fn compute_prefix_size(profile: &ObfuscationProfile, seq: u64) -> usize {
    if !profile.enabled || profile.max_prefix == 0 || profile.max_prefix < profile.min_prefix {
        return 0;
    }
    let span = (profile.max_prefix - profile.min_prefix + 1) as u64;
    profile.min_prefix + (prf_draw(&profile.seed, seq, b"prefix") % span) as usize
}

/// Deterministic in-packet padding size for a packet sequence.
pub fn compute_padding_size(profile: &ObfuscationProfile, seq: u64) -> usize {
    if !profile.enabled || profile.max_padding == 0 || profile.max_padding < profile.min_padding {
        return 0;
    }
    match profile.padding_distribution {
        PaddingDistribution::Uniform => {
            let span = (profile.max_padding - profile.min_padding + 1) as u64;
            profile.min_padding + (prf_draw(&profile.seed, seq, b"padding") % span) as usize
        }
        PaddingDistribution::Weighted(classes) => {
            let total: u64 = classes.iter().map(|c| c.weight as u64).sum();
            if total == 0 {
                return 0;
            }
            let mut pick = prf_draw(&profile.seed, seq, b"class") % total;
            let mut chosen = &classes[classes.len() - 1];
            for class in &classes {
                if pick < class.weight as u64 {
                    chosen = class;
                    break;
                }
                pick -= class.weight as u64;
            }
            if chosen.max < chosen.min {
                return chosen.min;
            }
            let span = (chosen.max - chosen.min + 1) as u64;
            chosen.min + (prf_draw(&profile.seed, seq, b"padding") % span) as usize
        }
    }
}

/// Deterministic prefix filler bytes for a packet sequence.
pub fn prefix_bytes(profile: &ObfuscationProfile, seq: u64) -> Vec<u8> {
    let len = compute_prefix_size(profile, seq);
    PrfStream::new(&profile.seed, seq, b"prefix-bytes").take(len)
}

/// Deterministic padding filler bytes of the derived size.
pub fn padding_bytes(profile: &ObfuscationProfile, seq: u64) -> Vec<u8> {
    let len = compute_padding_size(profile, seq);
    PrfStream::new(&profile.seed, seq, b"padding-bytes").take(len)
}

/// Deterministic send delay for a packet sequence.
///
/// The same packet observed twice is shaped identically, so retransmit
/// timing leaks nothing about queue state.
pub fn compute_timing_jitter(profile: &ObfuscationProfile, seq: u64) -> Duration {
    if !profile.enabled || !profile.timing_jitter_enabled || profile.max_jitter.is_zero() {
        return Duration::ZERO;
    }
    let max_ms = profile.max_jitter.as_millis() as u64;
    let mut stream = PrfStream::new(&profile.seed, seq, b"jitter");
    let ms = match profile.jitter_model {
        JitterModel::Uniform => stream.next_range(0, max_ms),
        JitterModel::PoissonLike => {
            // Knuth rejection sampling: count draws until the running product
            // of uniforms falls below e^-lambda.
            let lambda = profile.jitter_scale.max(0.1);
            let threshold = (-lambda).exp();
            let mut product = 1.0f64;
            let mut events = 0u64;
            while product > threshold && events < 64 {
                product *= stream.next_unit();
                events += 1;
            }
            let events = events.saturating_sub(1);
            let per_event = (max_ms as f64 / (2.0 * lambda)).max(1.0);
            ((events as f64 * per_event) as u64).min(max_ms)
        }
        JitterModel::Exponential => {
            let unit = stream.next_unit().max(f64::MIN_POSITIVE);
            let scale = if profile.jitter_scale > 0.0 {
                max_ms as f64 / (2.0 * profile.jitter_scale)
            } else {
                max_ms as f64 / 4.0
            };
            ((-unit.ln() * scale) as u64).min(max_ms)
        }
    };
    Duration::from_millis(ms)
}

/// Deterministic gap before heartbeat number `count`.
pub fn compute_heartbeat_interval(profile: &ObfuscationProfile, count: u64) -> Duration {
    let min_ms = profile.heartbeat_min.as_millis() as u64;
    let max_ms = profile.heartbeat_max.as_millis() as u64;
    if max_ms <= min_ms {
        return profile.heartbeat_min;
    }
    let mut stream = PrfStream::new(&profile.seed, count, b"heartbeat");
    let ms = match profile.heartbeat_model {
        HeartbeatTimingModel::Uniform => stream.next_range(min_ms, max_ms),
        HeartbeatTimingModel::Exponential => {
            let unit = stream.next_unit().max(f64::MIN_POSITIVE);
            let mean = (max_ms - min_ms) as f64 / 2.0;
            min_ms + ((-unit.ln() * mean) as u64).min(max_ms - min_ms)
        }
        HeartbeatTimingModel::Burst => {
            // Three short gaps out of four, then an occasional long silence.
            if stream.next_range(0, 3) < 3 {
                let burst_span = ((max_ms - min_ms) / 8).max(1);
                stream.next_range(min_ms, min_ms + burst_span)
            } else {
                let quiet_floor = max_ms - (max_ms - min_ms) / 4;
                stream.next_range(quiet_floor, max_ms)
            }
        }
    };
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OsRandom;

    fn test_profile() -> ObfuscationProfile {
        let mut seed = [0u8; PROFILE_SEED_SIZE];
        for (i, b) in seed.iter_mut().enumerate() {
            *b = i as u8;
        }
        ObfuscationProfile {
            enabled: true,
            seed,
            min_padding: 10,
            max_padding: 100,
            min_prefix: 4,
            max_prefix: 12,
            timing_jitter_enabled: true,
            max_jitter: Duration::from_millis(50),
            ..ObfuscationProfile::default()
        }
    }

    #[test]
    fn generated_seeds_are_random() {
        let mut rng = OsRandom;
        let a = generate_profile_seed(&mut rng);
        let b = generate_profile_seed(&mut rng);
        assert_ne!(a, b);
        assert!(a.iter().any(|&x| x != 0));
    }

    #[test]
    fn padding_size_within_bounds() {
        let profile = test_profile();
        for seq in 0..1000 {
            let size = compute_padding_size(&profile, seq);
            assert!(size >= profile.min_padding);
            assert!(size <= profile.max_padding);
        }
    }

    #[test]
    fn padding_size_is_deterministic() {
        let profile = test_profile();
        for seq in 0..100 {
            assert_eq!(compute_padding_size(&profile, seq), compute_padding_size(&profile, seq));
        }
    }

    #[test]
    fn padding_size_varies_with_sequence() {
        let profile = test_profile();
        let sizes: std::collections::HashSet<_> =
            (0..1000).map(|seq| compute_padding_size(&profile, seq)).collect();
        assert!(sizes.len() >= 10);
    }

    #[test]
    fn disabled_profile_produces_nothing() {
        let mut profile = test_profile();
        profile.enabled = false;
        assert_eq!(compute_padding_size(&profile, 0), 0);
        assert_eq!(compute_prefix_size(&profile, 0), 0);
        assert_eq!(compute_timing_jitter(&profile, 0), Duration::ZERO);
        assert!(prefix_bytes(&profile, 0).is_empty());
    }

    #[test]
    fn zero_max_padding_produces_nothing() {
        let mut profile = test_profile();
        profile.min_padding = 0;
        profile.max_padding = 0;
        assert_eq!(compute_padding_size(&profile, 0), 0);
    }

    #[test]
    fn prefix_size_within_bounds_and_deterministic() {
        let profile = test_profile();
        for seq in 0..1000 {
            let size = compute_prefix_size(&profile, seq);
            assert!((profile.min_prefix..=profile.max_prefix).contains(&size));
            assert_eq!(size, compute_prefix_size(&profile, seq));
        }
    }

    #[test]
    fn prefix_bytes_match_derived_size_and_differ_by_seq() {
        let profile = test_profile();
        let a = prefix_bytes(&profile, 1);
        let b = prefix_bytes(&profile, 2);
        assert_eq!(a.len(), compute_prefix_size(&profile, 1));
        assert_eq!(b.len(), compute_prefix_size(&profile, 2));
        // Same length can collide, but content should not.
        if a.len() == b.len() && !a.is_empty() {
            assert_ne!(a, b);
        }
    }

    #[test]
    fn weighted_padding_respects_class_bounds() {
        let mut profile = test_profile();
        profile.padding_distribution = PaddingDistribution::Weighted([
            SizeClass { weight: 6, min: 8, max: 32 },
            SizeClass { weight: 3, min: 64, max: 128 },
            SizeClass { weight: 1, min: 256, max: 512 },
        ]);
        profile.max_padding = 512;
        let mut seen_small = false;
        let mut seen_large = false;
        for seq in 0..2000 {
            let size = compute_padding_size(&profile, seq);
            let in_class = (8..=32).contains(&size)
                || (64..=128).contains(&size)
                || (256..=512).contains(&size);
            assert!(in_class, "size {size} outside every class");
            seen_small |= size <= 32;
            seen_large |= size >= 64;
        }
        assert!(seen_small && seen_large);
    }

    #[test]
    fn jitter_within_bounds_for_all_models() {
        let mut profile = test_profile();
        for model in [JitterModel::Uniform, JitterModel::PoissonLike, JitterModel::Exponential] {
            profile.jitter_model = model;
            for seq in 0..500 {
                let jitter = compute_timing_jitter(&profile, seq);
                assert!(jitter <= profile.max_jitter, "{model:?} exceeded max at {seq}");
                assert_eq!(jitter, compute_timing_jitter(&profile, seq));
            }
        }
    }

    #[test]
    fn heartbeat_interval_within_bounds_for_all_models() {
        let mut profile = test_profile();
        for model in [
            HeartbeatTimingModel::Uniform,
            HeartbeatTimingModel::Exponential,
            HeartbeatTimingModel::Burst,
        ] {
            profile.heartbeat_model = model;
            for count in 0..500 {
                let gap = compute_heartbeat_interval(&profile, count);
                assert!(gap >= profile.heartbeat_min, "{model:?} below min at {count}");
                assert!(gap <= profile.heartbeat_max, "{model:?} above max at {count}");
                assert_eq!(gap, compute_heartbeat_interval(&profile, count));
            }
        }
    }

    #[test]
    fn different_seeds_produce_different_results() {
        let profile = test_profile();
        let mut other = profile.clone();
        other.seed[0] = 0xFF;
        let paddings_differ =
            (0..64).any(|seq| compute_padding_size(&profile, seq) != compute_padding_size(&other, seq));
        let prefixes_differ =
            (0..64).any(|seq| compute_prefix_size(&profile, seq) != compute_prefix_size(&other, seq));
        assert!(paddings_differ);
        assert!(prefixes_differ);
        assert_ne!(
            PrfStream::new(&profile.seed, 0, b"prefix-bytes").take(16),
            PrfStream::new(&other.seed, 0, b"prefix-bytes").take(16)
        );
    }
}
