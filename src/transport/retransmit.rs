//! Retransmit buffer with RTT estimation.
//!
//! Holds sealed packets until they are acknowledged, schedules retransmits
//! on per-entry timeouts with exponential backoff, and maintains a
//! Jacobson-Karels RTT estimate. Per Karn's algorithm, packets that were
//! retransmitted never contribute RTT samples — the ACK is ambiguous about
//! which transmission it answers.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::core::{INITIAL_RTO, MAX_RETRIES, MAX_RTO, MIN_RTO};

/// What to do when an insert would exceed the byte budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPolicy {
    /// Evict the lowest-sequence entries until the new packet fits.
    Oldest,
    /// Reject the new packet.
    Newest,
}

/// Tuning for the retransmit buffer.
#[derive(Debug, Clone, Copy)]
pub struct RetransmitConfig {
    /// Byte budget across all buffered packets.
    pub max_buffer_bytes: usize,
    /// RTO before the first RTT sample.
    pub initial_rto: Duration,
    /// Lower clamp for the computed RTO.
    pub min_rto: Duration,
    /// Upper clamp for the computed RTO and for backoff.
    pub max_rto: Duration,
    /// Retransmissions allowed before a packet is dropped.
    pub max_retries: u32,
    /// Behavior when the byte budget is exhausted.
    pub drop_policy: DropPolicy,
}

impl Default for RetransmitConfig {
    fn default() -> Self {
        Self {
            max_buffer_bytes: 1 << 20,
            initial_rto: INITIAL_RTO,
            min_rto: MIN_RTO,
            max_rto: MAX_RTO,
            max_retries: MAX_RETRIES,
            drop_policy: DropPolicy::Oldest,
        }
    }
}

/// Lifecycle of a buffered packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetransmitState {
    /// Sent once, awaiting acknowledgment.
    Pending,
    /// Resent at least once.
    Retransmitted,
    /// Acknowledged; entry is about to leave the buffer.
    Acknowledged,
    /// Dropped after exhausting retries or by eviction.
    Dropped,
}

/// One unacknowledged packet.
#[derive(Debug, Clone)]
pub struct RetransmitEntry {
    /// Outer packet sequence.
    pub sequence: u64,
    /// Sealed packet bytes, resent verbatim.
    pub bytes: Vec<u8>,
    /// When the packet was first sent.
    pub first_send: Instant,
    /// When the packet was last (re)sent.
    pub last_send: Instant,
    /// Retransmissions so far.
    pub retry_count: u32,
    /// Current per-entry timeout; doubles on each retransmit.
    pub rto: Duration,
    /// Lifecycle state.
    pub state: RetransmitState,
}

/// Counters for retransmit activity.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetransmitStats {
    /// Packets acknowledged out of the buffer.
    pub packets_acked: u64,
    /// Retransmissions performed.
    pub packets_retransmitted: u64,
    /// Packets dropped (retries exhausted, eviction, explicit drop).
    pub packets_dropped: u64,
    /// Inserts rejected by the byte budget.
    pub inserts_rejected: u64,
}

/// Send-side buffer of unacknowledged packets.
#[derive(Debug)]
pub struct RetransmitBuffer {
    config: RetransmitConfig,
    entries: BTreeMap<u64, RetransmitEntry>,
    buffered_bytes: usize,
    // Jacobson-Karels state, in milliseconds.
    srtt_ms: Option<f64>,
    rttvar_ms: f64,
    stats: RetransmitStats,
}

impl RetransmitBuffer {
    /// An empty buffer with the given tuning.
    pub fn new(config: RetransmitConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
            buffered_bytes: 0,
            srtt_ms: None,
            rttvar_ms: 0.0,
            stats: RetransmitStats::default(),
        }
    }

    /// Buffer a freshly sent packet. Returns `false` when rejected
    /// (duplicate sequence, or byte budget under the `Newest` policy).
    pub fn insert(&mut self, sequence: u64, bytes: Vec<u8>, now: Instant) -> bool {
        if self.entries.contains_key(&sequence) {
            return false;
        }
        if bytes.len() > self.config.max_buffer_bytes {
            self.stats.inserts_rejected += 1;
            return false;
        }
        while self.buffered_bytes + bytes.len() > self.config.max_buffer_bytes {
            match self.config.drop_policy {
                DropPolicy::Newest => {
                    self.stats.inserts_rejected += 1;
                    return false;
                }
                DropPolicy::Oldest => {
                    let oldest = *self.entries.keys().next().expect("budget exceeded implies entries");
                    self.remove_entry(oldest, RetransmitState::Dropped);
                    self.stats.packets_dropped += 1;
                }
            }
        }
        self.buffered_bytes += bytes.len();
        self.entries.insert(
            sequence,
            RetransmitEntry {
                sequence,
                bytes,
                first_send: now,
                last_send: now,
                retry_count: 0,
                rto: self.current_rto(),
                state: RetransmitState::Pending,
            },
        );
        true
    }

    /// Acknowledge one sequence. Samples RTT when the packet was never
    /// retransmitted. Returns whether the sequence was pending.
    pub fn acknowledge(&mut self, sequence: u64, now: Instant) -> bool {
        let Some(entry) = self.entries.get(&sequence) else {
            return false;
        };
        if entry.retry_count == 0 {
            let sample = now.saturating_duration_since(entry.first_send);
            self.update_rtt(sample);
        }
        self.remove_entry(sequence, RetransmitState::Acknowledged);
        self.stats.packets_acked += 1;
        true
    }

    /// Acknowledge every sequence at or below `up_to`. Returns how many
    /// entries were removed.
    pub fn acknowledge_cumulative(&mut self, up_to: u64, now: Instant) -> usize {
        let sequences: Vec<u64> =
            self.entries.range(..=up_to).map(|(&sequence, _)| sequence).collect();
        for &sequence in &sequences {
            self.acknowledge(sequence, now);
        }
        sequences.len()
    }

    /// Sequences whose per-entry timeout has expired.
    pub fn packets_to_retransmit(&self, now: Instant) -> Vec<u64> {
        self.entries
            .values()
            .filter(|entry| now.saturating_duration_since(entry.last_send) >= entry.rto)
            .map(|entry| entry.sequence)
            .collect()
    }

    /// Record a retransmission: bumps the retry count, restamps the send
    /// time, and doubles the per-entry RTO (clamped to `max_rto`).
    ///
    /// Returns `false` — and drops the packet — once retries are exhausted.
    pub fn mark_retransmitted(&mut self, sequence: u64, now: Instant) -> bool {
        let Some(entry) = self.entries.get_mut(&sequence) else {
            return false;
        };
        if entry.retry_count >= self.config.max_retries {
            self.remove_entry(sequence, RetransmitState::Dropped);
            self.stats.packets_dropped += 1;
            return false;
        }
        entry.retry_count += 1;
        entry.last_send = now;
        entry.rto = (entry.rto * 2).min(self.config.max_rto);
        entry.state = RetransmitState::Retransmitted;
        self.stats.packets_retransmitted += 1;
        true
    }

    /// Drop one packet without acknowledgment.
    pub fn drop_packet(&mut self, sequence: u64) -> bool {
        if self.entries.contains_key(&sequence) {
            self.remove_entry(sequence, RetransmitState::Dropped);
            self.stats.packets_dropped += 1;
            true
        } else {
            false
        }
    }

    /// Access a buffered entry.
    pub fn get(&self, sequence: u64) -> Option<&RetransmitEntry> {
        self.entries.get(&sequence)
    }

    /// Number of buffered packets.
    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    /// Bytes currently buffered.
    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    /// Whether `bytes` more would fit the budget.
    pub fn has_capacity(&self, bytes: usize) -> bool {
        self.buffered_bytes + bytes <= self.config.max_buffer_bytes
    }

    /// Smoothed RTT; the configured initial RTO before any sample.
    pub fn estimated_rtt(&self) -> Duration {
        match self.srtt_ms {
            Some(srtt) => Duration::from_secs_f64(srtt / 1000.0),
            None => self.config.initial_rto,
        }
    }

    /// Current RTO: `clamp(SRTT + 4·RTTVAR, min_rto, max_rto)`, or the
    /// clamped initial RTO before any sample.
    pub fn current_rto(&self) -> Duration {
        let raw_ms = match self.srtt_ms {
            Some(srtt) => srtt + 4.0 * self.rttvar_ms,
            None => self.config.initial_rto.as_secs_f64() * 1000.0,
        };
        let clamped = raw_ms.clamp(
            self.config.min_rto.as_secs_f64() * 1000.0,
            self.config.max_rto.as_secs_f64() * 1000.0,
        );
        Duration::from_secs_f64(clamped / 1000.0)
    }

    /// Activity counters.
    pub fn stats(&self) -> RetransmitStats {
        self.stats
    }

    fn update_rtt(&mut self, sample: Duration) {
        let sample_ms = sample.as_secs_f64() * 1000.0;
        match self.srtt_ms {
            None => {
                self.srtt_ms = Some(sample_ms);
                self.rttvar_ms = sample_ms / 2.0;
            }
            Some(srtt) => {
                self.rttvar_ms = 0.75 * self.rttvar_ms + 0.25 * (srtt - sample_ms).abs();
                self.srtt_ms = Some(0.875 * srtt + 0.125 * sample_ms);
            }
        }
    }

    fn remove_entry(&mut self, sequence: u64, state: RetransmitState) {
        if let Some(mut entry) = self.entries.remove(&sequence) {
            entry.state = state;
            self.buffered_bytes -= entry.bytes.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn buffer_with(config: RetransmitConfig) -> (RetransmitBuffer, Instant) {
        (RetransmitBuffer::new(config), Instant::now())
    }

    #[test]
    fn insert_and_acknowledge() {
        let (mut buffer, start) = buffer_with(RetransmitConfig::default());
        assert!(buffer.insert(1, vec![1, 2, 3, 4], start));
        assert_eq!(buffer.pending_count(), 1);
        assert_eq!(buffer.buffered_bytes(), 4);

        assert!(buffer.acknowledge(1, start + ms(50)));
        assert_eq!(buffer.pending_count(), 0);
        assert_eq!(buffer.buffered_bytes(), 0);
        assert_eq!(buffer.stats().packets_acked, 1);
    }

    #[test]
    fn acknowledge_cumulative_skips_gaps() {
        let (mut buffer, start) = buffer_with(RetransmitConfig::default());
        buffer.insert(1, vec![1], start);
        buffer.insert(2, vec![2, 3], start);
        buffer.insert(3, vec![4, 5, 6], start);
        buffer.insert(5, vec![7], start);

        assert_eq!(buffer.acknowledge_cumulative(3, start + ms(50)), 3);
        assert_eq!(buffer.pending_count(), 1);
        assert!(!buffer.acknowledge(1, start + ms(51)));
        assert!(buffer.acknowledge(5, start + ms(51)));
    }

    #[test]
    fn retransmit_after_timeout() {
        let config = RetransmitConfig { initial_rto: ms(100), ..RetransmitConfig::default() };
        let (mut buffer, start) = buffer_with(config);
        buffer.insert(1, vec![1, 2, 3], start);

        assert!(buffer.packets_to_retransmit(start + ms(50)).is_empty());
        assert_eq!(buffer.packets_to_retransmit(start + ms(101)), vec![1]);

        assert!(buffer.mark_retransmitted(1, start + ms(101)));
        assert_eq!(buffer.stats().packets_retransmitted, 1);
        assert!(buffer.packets_to_retransmit(start + ms(102)).is_empty());
    }

    #[test]
    fn backoff_doubles_until_retries_exhausted() {
        let config = RetransmitConfig {
            initial_rto: ms(100),
            max_retries: 3,
            ..RetransmitConfig::default()
        };
        let (mut buffer, start) = buffer_with(config);
        buffer.insert(1, vec![1], start);

        // First timeout at ~100ms.
        let mut now = start + ms(101);
        assert_eq!(buffer.packets_to_retransmit(now), vec![1]);
        assert!(buffer.mark_retransmitted(1, now));

        // Second at ~200ms after the first retransmit.
        now += ms(199);
        assert!(buffer.packets_to_retransmit(now).is_empty());
        now += ms(2);
        assert_eq!(buffer.packets_to_retransmit(now), vec![1]);
        assert!(buffer.mark_retransmitted(1, now));

        // Third at ~400ms.
        now += ms(401);
        assert_eq!(buffer.packets_to_retransmit(now), vec![1]);
        assert!(buffer.mark_retransmitted(1, now));

        // Retries exhausted: the packet is dropped.
        now += ms(801);
        assert_eq!(buffer.packets_to_retransmit(now), vec![1]);
        assert!(!buffer.mark_retransmitted(1, now));
        assert_eq!(buffer.pending_count(), 0);
        assert_eq!(buffer.stats().packets_dropped, 1);
    }

    #[test]
    fn rto_grows_at_least_exponentially() {
        let config =
            RetransmitConfig { initial_rto: ms(100), max_rto: ms(60_000), ..Default::default() };
        let (mut buffer, start) = buffer_with(config);
        buffer.insert(1, vec![1], start);

        let mut now = start;
        for k in 1..=5u32 {
            now += ms(100) * 2u32.pow(k);
            assert!(buffer.mark_retransmitted(1, now));
            let rto = buffer.get(1).expect("still buffered").rto;
            assert!(rto >= ms(100) * 2u32.pow(k).min(600), "after {k} retransmits rto={rto:?}");
        }
    }

    #[test]
    fn newest_policy_rejects_when_full() {
        let config = RetransmitConfig {
            max_buffer_bytes: 10,
            drop_policy: DropPolicy::Newest,
            ..RetransmitConfig::default()
        };
        let (mut buffer, start) = buffer_with(config);
        assert!(buffer.insert(1, vec![0; 4], start));
        assert!(buffer.insert(2, vec![0; 4], start));
        assert!(!buffer.insert(3, vec![0; 3], start));
        assert!(buffer.insert(3, vec![0; 2], start));
        assert!(!buffer.insert(4, vec![0; 1], start));

        assert_eq!(buffer.buffered_bytes(), 10);
        assert!(!buffer.has_capacity(1));

        buffer.acknowledge(1, start);
        assert_eq!(buffer.buffered_bytes(), 6);
        assert!(buffer.has_capacity(4));
    }

    #[test]
    fn oldest_policy_evicts_lowest_sequence() {
        let config = RetransmitConfig {
            max_buffer_bytes: 10,
            drop_policy: DropPolicy::Oldest,
            ..RetransmitConfig::default()
        };
        let (mut buffer, start) = buffer_with(config);
        assert!(buffer.insert(1, vec![0; 5], start));
        assert!(buffer.insert(2, vec![0; 5], start));
        assert!(buffer.insert(3, vec![0; 5], start));

        assert_eq!(buffer.pending_count(), 2);
        assert!(buffer.get(1).is_none(), "lowest sequence evicted");
        assert!(buffer.get(2).is_some());
        assert!(buffer.get(3).is_some());
        assert_eq!(buffer.stats().packets_dropped, 1);
    }

    #[test]
    fn rtt_estimation_smooths_samples() {
        let config = RetransmitConfig { initial_rto: ms(100), ..RetransmitConfig::default() };
        let (mut buffer, start) = buffer_with(config);

        buffer.insert(1, vec![1], start);
        buffer.acknowledge(1, start + ms(80));
        assert_eq!(buffer.estimated_rtt(), ms(80));

        buffer.insert(2, vec![2], start + ms(100));
        buffer.acknowledge(2, start + ms(220));
        // SRTT = 0.875 * 80 + 0.125 * 120 = 85.
        let srtt = buffer.estimated_rtt();
        assert!(srtt >= ms(80) && srtt <= ms(90), "srtt={srtt:?}");
    }

    #[test]
    fn karns_algorithm_skips_retransmitted_samples() {
        let config = RetransmitConfig { initial_rto: ms(100), ..RetransmitConfig::default() };
        let (mut buffer, start) = buffer_with(config);

        buffer.insert(1, vec![1], start);
        buffer.mark_retransmitted(1, start + ms(101));

        let rtt_before = buffer.estimated_rtt();
        buffer.acknowledge(1, start + ms(151));
        assert_eq!(buffer.estimated_rtt(), rtt_before);
    }

    #[test]
    fn duplicate_insert_rejected() {
        let (mut buffer, start) = buffer_with(RetransmitConfig::default());
        assert!(buffer.insert(1, vec![1, 2, 3], start));
        assert!(!buffer.insert(1, vec![4, 5, 6], start));
        assert_eq!(buffer.buffered_bytes(), 3);
    }

    #[test]
    fn drop_packet_removes_entry() {
        let (mut buffer, start) = buffer_with(RetransmitConfig::default());
        buffer.insert(1, vec![1, 2, 3], start);
        buffer.insert(2, vec![4, 5], start);

        assert!(buffer.drop_packet(1));
        assert!(!buffer.drop_packet(1));
        assert_eq!(buffer.pending_count(), 1);
        assert_eq!(buffer.buffered_bytes(), 2);
        assert_eq!(buffer.stats().packets_dropped, 1);
    }

    #[test]
    fn rto_clamped_to_configured_bounds() {
        let config = RetransmitConfig {
            initial_rto: ms(10),
            min_rto: ms(50),
            max_rto: ms(500),
            ..RetransmitConfig::default()
        };
        let (mut buffer, start) = buffer_with(config);

        buffer.insert(1, vec![1], start);
        buffer.acknowledge(1, start + ms(10));
        assert!(buffer.current_rto() >= ms(50));

        buffer.insert(2, vec![2], start + ms(20));
        buffer.acknowledge(2, start + ms(10_020));
        assert!(buffer.current_rto() <= ms(500));
    }
}
