//! Per-peer traffic admission with burst handling and abuse tracking.
//!
//! A server fronting many tunnels needs more than the single handshake
//! bucket: per-peer bandwidth and packet-rate budgets, a burst allowance
//! with a penalty period once it is exhausted, reconnect-abuse tracking,
//! and enough counters to see who is being throttled. Peers are identified
//! by an opaque string chosen by the embedding service.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Traffic priority for shaping decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrafficPriority {
    /// Background traffic, dropped first.
    Low,
    /// Regular data traffic.
    Normal,
    /// Control messages.
    High,
    /// Keepalives and session-critical traffic, never rate-dropped.
    Critical,
}

/// Tuning for per-peer admission.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Bandwidth budget in bytes per second.
    pub bandwidth_bytes_per_sec: u64,
    /// Packet budget per second.
    pub packets_per_sec: u64,
    /// Burst allowance as a multiple of the per-second budget.
    pub burst_allowance_factor: f64,
    /// Penalty period after a burst is exhausted.
    pub burst_penalty: Duration,
    /// Reconnects allowed per tracking window before abuse is flagged.
    pub max_reconnects_per_window: u32,
    /// Reconnect tracking window.
    pub reconnect_window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            bandwidth_bytes_per_sec: 100 * 1024 * 1024,
            packets_per_sec: 10_000,
            burst_allowance_factor: 1.5,
            burst_penalty: Duration::from_millis(1000),
            max_reconnects_per_window: 5,
            reconnect_window: Duration::from_secs(60),
        }
    }
}

/// Per-peer admission counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeerRateStats {
    /// Bytes admitted.
    pub bytes_allowed: u64,
    /// Bytes refused.
    pub bytes_denied: u64,
    /// Packets admitted.
    pub packets_allowed: u64,
    /// Packets refused.
    pub packets_denied: u64,
    /// Reconnect attempts recorded.
    pub reconnects: u64,
    /// Budget violations observed.
    pub violations: u64,
}

/// Token bucket with a burst reservoir and a penalty period.
///
/// The reservoir holds `rate * burst_factor` tokens; draining it below 10%
/// starts a penalty during which nothing is admitted, which stops a peer
/// from riding the refill rate at line speed after an abusive burst.
#[derive(Debug, Clone)]
pub struct BurstTokenBucket {
    rate_per_sec: f64,
    burst_capacity: f64,
    tokens: f64,
    penalty: Duration,
    penalty_until: Option<Instant>,
    last_refill: Option<Instant>,
}

impl BurstTokenBucket {
    /// A full reservoir for the given rate and burst factor.
    pub fn new(rate_per_sec: u64, burst_factor: f64, penalty: Duration) -> Self {
        let burst_capacity = rate_per_sec as f64 * burst_factor.max(1.0);
        Self {
            rate_per_sec: rate_per_sec as f64,
            burst_capacity,
            tokens: burst_capacity,
            penalty,
            penalty_until: None,
            last_refill: None,
        }
    }

    /// Try to take `tokens` at `now`.
    pub fn try_consume(&mut self, tokens: u64, now: Instant) -> bool {
        self.refill(now);

        if let Some(until) = self.penalty_until {
            if now < until {
                return false;
            }
            self.penalty_until = None;
        }

        let requested = tokens as f64;
        if self.tokens >= requested {
            self.tokens -= requested;
            return true;
        }

        if self.tokens < self.burst_capacity * 0.1 {
            self.penalty_until = Some(now + self.penalty);
        }
        false
    }

    /// Whether the bucket is inside its penalty period.
    pub fn is_penalized(&self, now: Instant) -> bool {
        self.penalty_until.is_some_and(|until| now < until)
    }

    /// Tokens currently held (after refilling to `now`).
    pub fn current_tokens(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        if let Some(last) = self.last_refill {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.burst_capacity);
        }
        self.last_refill = Some(now);
    }
}

/// Admission state for one peer.
#[derive(Debug)]
pub struct PeerRateLimiter {
    config: RateLimiterConfig,
    bandwidth: BurstTokenBucket,
    packets: BurstTokenBucket,
    reconnects: VecDeque<Instant>,
    stats: PeerRateStats,
    last_activity: Option<Instant>,
}

impl PeerRateLimiter {
    /// Fresh state under the given config.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            bandwidth: BurstTokenBucket::new(
                config.bandwidth_bytes_per_sec,
                config.burst_allowance_factor,
                config.burst_penalty,
            ),
            packets: BurstTokenBucket::new(
                config.packets_per_sec,
                config.burst_allowance_factor,
                config.burst_penalty,
            ),
            config,
            reconnects: VecDeque::new(),
            stats: PeerRateStats::default(),
            last_activity: None,
        }
    }

    /// Admit or refuse one packet of `size_bytes`.
    ///
    /// Critical traffic bypasses the budgets; everything else must fit both
    /// the bandwidth and the packet-rate reservoirs.
    pub fn allow_packet(&mut self, size_bytes: u64, priority: TrafficPriority, now: Instant) -> bool {
        self.last_activity = Some(now);

        if priority == TrafficPriority::Critical {
            self.stats.bytes_allowed += size_bytes;
            self.stats.packets_allowed += 1;
            return true;
        }

        let bandwidth_ok = self.bandwidth.try_consume(size_bytes, now);
        let packets_ok = bandwidth_ok && self.packets.try_consume(1, now);
        if bandwidth_ok && packets_ok {
            self.stats.bytes_allowed += size_bytes;
            self.stats.packets_allowed += 1;
            true
        } else {
            self.stats.bytes_denied += size_bytes;
            self.stats.packets_denied += 1;
            self.stats.violations += 1;
            false
        }
    }

    /// Record a reconnect attempt; `false` flags reconnect abuse.
    pub fn record_reconnect(&mut self, now: Instant) -> bool {
        self.last_activity = Some(now);
        self.stats.reconnects += 1;

        let window = self.config.reconnect_window;
        while let Some(&front) = self.reconnects.front() {
            if now.saturating_duration_since(front) > window {
                self.reconnects.pop_front();
            } else {
                break;
            }
        }

        self.reconnects.push_back(now);
        if self.reconnects.len() as u32 > self.config.max_reconnects_per_window {
            self.stats.violations += 1;
            false
        } else {
            true
        }
    }

    /// Whether either budget is currently in penalty.
    pub fn is_blocked(&self, now: Instant) -> bool {
        self.bandwidth.is_penalized(now) || self.packets.is_penalized(now)
    }

    /// Admission counters.
    pub fn stats(&self) -> PeerRateStats {
        self.stats
    }

    fn idle_since(&self, now: Instant) -> Duration {
        match self.last_activity {
            Some(at) => now.saturating_duration_since(at),
            None => Duration::MAX,
        }
    }
}

/// Aggregate view across all tracked peers.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalRateStats {
    /// Peers currently tracked.
    pub tracked_peers: usize,
    /// Peers currently in a penalty period.
    pub blocked_peers: usize,
    /// Bytes admitted across peers.
    pub total_bytes_allowed: u64,
    /// Bytes refused across peers.
    pub total_bytes_denied: u64,
    /// Packets admitted across peers.
    pub total_packets_allowed: u64,
    /// Packets refused across peers.
    pub total_packets_denied: u64,
    /// Violations across peers.
    pub total_violations: u64,
}

/// Admission control across many peers with per-peer overrides.
#[derive(Debug, Default)]
pub struct AdvancedRateLimiter {
    default_config: RateLimiterConfig,
    overrides: HashMap<String, RateLimiterConfig>,
    peers: HashMap<String, PeerRateLimiter>,
}

impl AdvancedRateLimiter {
    /// A limiter applying `config` to every peer without an override.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self { default_config: config, overrides: HashMap::new(), peers: HashMap::new() }
    }

    /// Override the config for one peer (applies on its next first sighting
    /// or immediately if not yet tracked).
    pub fn set_peer_config(&mut self, peer: &str, config: RateLimiterConfig) {
        self.overrides.insert(peer.to_string(), config);
        self.peers.remove(peer);
    }

    /// Admit or refuse a packet for `peer`.
    pub fn allow_packet(
        &mut self,
        peer: &str,
        size_bytes: u64,
        priority: TrafficPriority,
        now: Instant,
    ) -> bool {
        self.peer_entry(peer).allow_packet(size_bytes, priority, now)
    }

    /// Record a reconnect attempt for `peer`.
    pub fn record_reconnect(&mut self, peer: &str, now: Instant) -> bool {
        self.peer_entry(peer).record_reconnect(now)
    }

    /// Stop tracking a peer.
    pub fn remove_peer(&mut self, peer: &str) {
        self.peers.remove(peer);
    }

    /// Counters for one peer, if tracked.
    pub fn peer_stats(&self, peer: &str) -> Option<PeerRateStats> {
        self.peers.get(peer).map(PeerRateLimiter::stats)
    }

    /// Aggregate counters.
    pub fn global_stats(&self, now: Instant) -> GlobalRateStats {
        let mut global = GlobalRateStats { tracked_peers: self.peers.len(), ..Default::default() };
        for peer in self.peers.values() {
            let stats = peer.stats();
            global.total_bytes_allowed += stats.bytes_allowed;
            global.total_bytes_denied += stats.bytes_denied;
            global.total_packets_allowed += stats.packets_allowed;
            global.total_packets_denied += stats.packets_denied;
            global.total_violations += stats.violations;
            if peer.is_blocked(now) {
                global.blocked_peers += 1;
            }
        }
        global
    }

    /// Drop peers idle longer than `max_idle`. Returns how many were
    /// removed.
    pub fn cleanup_inactive(&mut self, max_idle: Duration, now: Instant) -> usize {
        let before = self.peers.len();
        self.peers.retain(|_, peer| peer.idle_since(now) <= max_idle);
        before - self.peers.len()
    }

    fn peer_entry(&mut self, peer: &str) -> &mut PeerRateLimiter {
        if !self.peers.contains_key(peer) {
            let config = self.overrides.get(peer).copied().unwrap_or(self.default_config);
            self.peers.insert(peer.to_string(), PeerRateLimiter::new(config));
        }
        self.peers.get_mut(peer).expect("inserted above")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> RateLimiterConfig {
        RateLimiterConfig {
            bandwidth_bytes_per_sec: 1000,
            packets_per_sec: 10,
            burst_allowance_factor: 1.0,
            burst_penalty: Duration::from_millis(500),
            max_reconnects_per_window: 3,
            reconnect_window: Duration::from_secs(60),
        }
    }

    #[test]
    fn burst_bucket_admits_up_to_capacity() {
        let mut bucket = BurstTokenBucket::new(100, 1.0, Duration::from_millis(500));
        let now = Instant::now();
        assert!(bucket.try_consume(60, now));
        assert!(bucket.try_consume(40, now));
        assert!(!bucket.try_consume(1, now));
    }

    #[test]
    fn burst_bucket_penalty_blocks_refill_riding() {
        let mut bucket = BurstTokenBucket::new(100, 1.0, Duration::from_millis(500));
        let start = Instant::now();
        assert!(bucket.try_consume(100, start));
        // Reservoir drained below 10%: this refusal starts the penalty.
        assert!(!bucket.try_consume(10, start));
        assert!(bucket.is_penalized(start));

        // Refill would cover the request, but the penalty holds.
        assert!(!bucket.try_consume(10, start + Duration::from_millis(200)));

        // After the penalty the refilled tokens flow again.
        assert!(bucket.try_consume(10, start + Duration::from_millis(600)));
    }

    #[test]
    fn peer_limiter_tracks_allowed_and_denied() {
        let mut peer = PeerRateLimiter::new(small_config());
        let now = Instant::now();
        assert!(peer.allow_packet(600, TrafficPriority::Normal, now));
        assert!(!peer.allow_packet(600, TrafficPriority::Normal, now));

        let stats = peer.stats();
        assert_eq!(stats.bytes_allowed, 600);
        assert_eq!(stats.bytes_denied, 600);
        assert_eq!(stats.packets_allowed, 1);
        assert_eq!(stats.packets_denied, 1);
        assert_eq!(stats.violations, 1);
    }

    #[test]
    fn critical_traffic_bypasses_budgets() {
        let mut peer = PeerRateLimiter::new(small_config());
        let now = Instant::now();
        assert!(peer.allow_packet(1000, TrafficPriority::Normal, now));
        assert!(peer.allow_packet(1_000_000, TrafficPriority::Critical, now));
    }

    #[test]
    fn packet_rate_limits_independently_of_bandwidth() {
        let mut peer = PeerRateLimiter::new(small_config());
        let now = Instant::now();
        for _ in 0..10 {
            assert!(peer.allow_packet(1, TrafficPriority::Normal, now));
        }
        // Bandwidth remains, but the packet budget is spent.
        assert!(!peer.allow_packet(1, TrafficPriority::Normal, now));
    }

    #[test]
    fn reconnect_abuse_is_flagged() {
        let mut peer = PeerRateLimiter::new(small_config());
        let start = Instant::now();
        for i in 0..3 {
            assert!(peer.record_reconnect(start + Duration::from_secs(i)));
        }
        assert!(!peer.record_reconnect(start + Duration::from_secs(3)));

        // Old attempts age out of the window.
        assert!(peer.record_reconnect(start + Duration::from_secs(120)));
    }

    #[test]
    fn manager_isolates_peers() {
        let mut limiter = AdvancedRateLimiter::new(small_config());
        let now = Instant::now();
        assert!(limiter.allow_packet("alpha", 1000, TrafficPriority::Normal, now));
        assert!(!limiter.allow_packet("alpha", 1000, TrafficPriority::Normal, now));
        assert!(limiter.allow_packet("beta", 1000, TrafficPriority::Normal, now));

        let global = limiter.global_stats(now);
        assert_eq!(global.tracked_peers, 2);
        assert_eq!(global.total_packets_allowed, 2);
        assert_eq!(global.total_packets_denied, 1);
    }

    #[test]
    fn manager_applies_peer_overrides() {
        let mut limiter = AdvancedRateLimiter::new(small_config());
        limiter.set_peer_config(
            "vip",
            RateLimiterConfig { bandwidth_bytes_per_sec: 1_000_000, ..small_config() },
        );
        let now = Instant::now();
        assert!(limiter.allow_packet("vip", 500_000, TrafficPriority::Normal, now));
        assert!(!limiter.allow_packet("other", 500_000, TrafficPriority::Normal, now));
    }

    #[test]
    fn manager_cleans_up_inactive_peers() {
        let mut limiter = AdvancedRateLimiter::new(small_config());
        let start = Instant::now();
        limiter.allow_packet("old", 1, TrafficPriority::Normal, start);
        limiter.allow_packet("new", 1, TrafficPriority::Normal, start + Duration::from_secs(100));

        let removed = limiter.cleanup_inactive(
            Duration::from_secs(50),
            start + Duration::from_secs(110),
        );
        assert_eq!(removed, 1);
        assert!(limiter.peer_stats("old").is_none());
        assert!(limiter.peer_stats("new").is_some());
    }
}
