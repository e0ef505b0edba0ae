//! Selective-ACK bitmap and the scheduler that decides when to emit ACKs.
//!
//! The bitmap is wraparound-aware: sequence ordering uses the TCP-style
//! signed comparison of differences, so the structure stays correct even at
//! the `u64` boundary (unreachable in practice, cheap to get right).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::core::{ACK_EVERY_N_PACKETS, MAX_ACK_DELAY};
use crate::transport::frame::AckFrame;

/// Wraparound-safe `a < b` over sequence numbers.
#[inline]
pub fn seq_less_than(a: u64, b: u64) -> bool {
    (a.wrapping_sub(b) as i64) < 0
}

/// 32-bit selective-ack summary anchored at the highest acked sequence.
///
/// Bit `d - 1` set means `head - d` has been received. Forward moves shift
/// the bitmap and record the previous head; backward moves within the
/// window set a bit; anything older is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct AckBitmap {
    head: u64,
    bitmap: u32,
    initialized: bool,
}

impl AckBitmap {
    /// An empty bitmap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `seq` as received.
    pub fn ack(&mut self, seq: u64) {
        if !self.initialized {
            self.head = seq;
            self.bitmap = 0;
            self.initialized = true;
            return;
        }

        if seq_less_than(self.head, seq) {
            let shift = seq.wrapping_sub(self.head);
            if shift >= 32 {
                self.bitmap = 0;
            } else {
                self.bitmap <<= shift;
                // The old head sits at distance `shift` now.
                self.bitmap |= 1u32 << (shift - 1);
            }
            self.head = seq;
            return;
        }

        let diff = self.head.wrapping_sub(seq);
        if diff == 0 || diff > 32 {
            return;
        }
        self.bitmap |= 1u32 << (diff - 1);
    }

    /// Whether `seq` has been recorded.
    pub fn is_acked(&self, seq: u64) -> bool {
        if !self.initialized {
            return false;
        }
        if seq == self.head {
            return true;
        }
        if seq_less_than(self.head, seq) {
            return false;
        }
        let diff = self.head.wrapping_sub(seq);
        if diff > 32 {
            return false;
        }
        (self.bitmap >> (diff - 1)) & 1 != 0
    }

    /// Highest recorded sequence.
    pub fn head(&self) -> u64 {
        self.head
    }

    /// Raw 32-bit window below the head.
    pub fn bitmap(&self) -> u32 {
        self.bitmap
    }
}

/// When to emit ACK frames.
#[derive(Debug, Clone, Copy)]
pub struct AckSchedulerConfig {
    /// Immediate ACK when a FIN arrives.
    pub immediate_on_fin: bool,
    /// Immediate ACK when a gap (out-of-order arrival) is detected.
    pub immediate_on_gap: bool,
    /// Immediate ACK after this many received packets.
    pub ack_every_n_packets: u32,
    /// Longest an ACK may wait for coalescing.
    pub max_ack_delay: Duration,
}

impl Default for AckSchedulerConfig {
    fn default() -> Self {
        Self {
            immediate_on_fin: true,
            immediate_on_gap: true,
            ack_every_n_packets: ACK_EVERY_N_PACKETS,
            max_ack_delay: MAX_ACK_DELAY,
        }
    }
}

/// Counters for ACK emission behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct AckSchedulerStats {
    /// ACK frames emitted.
    pub acks_sent: u64,
    /// Receipts answered immediately.
    pub acks_immediate: u64,
    /// Receipts deferred for coalescing.
    pub acks_delayed: u64,
    /// Receipts folded into a later ACK.
    pub acks_coalesced: u64,
    /// Out-of-order arrivals observed.
    pub gaps_detected: u64,
}

#[derive(Debug, Default)]
struct StreamAckState {
    // None until the first frame arrives; sequence 0 is a legitimate value.
    highest_received: Option<u64>,
    received: AckBitmap,
    packets_since_ack: u32,
    first_unacked_at: Option<Instant>,
    needs_ack: bool,
    gap_detected: bool,
}

/// Per-stream ACK bookkeeping and emission policy.
#[derive(Debug, Default)]
pub struct AckScheduler {
    config: AckSchedulerConfig,
    streams: HashMap<u64, StreamAckState>,
    stats: AckSchedulerStats,
}

impl AckScheduler {
    /// A scheduler with the given policy.
    pub fn new(config: AckSchedulerConfig) -> Self {
        Self { config, streams: HashMap::new(), stats: AckSchedulerStats::default() }
    }

    /// Record a received DATA sequence. Returns `true` when an ACK should be
    /// emitted immediately rather than waiting for the delay timer.
    pub fn on_frame_received(&mut self, stream_id: u64, sequence: u64, fin: bool, now: Instant) -> bool {
        let state = self.streams.entry(stream_id).or_default();

        // Gap: a sequence beyond the next expected one.
        if let Some(highest) = state.highest_received {
            if seq_less_than(highest.wrapping_add(1), sequence) {
                state.gap_detected = true;
                self.stats.gaps_detected += 1;
            }
        }

        state.received.ack(sequence);
        if state.highest_received.is_none_or(|highest| seq_less_than(highest, sequence)) {
            state.highest_received = Some(sequence);
        }

        state.packets_since_ack += 1;
        state.needs_ack = true;
        if state.first_unacked_at.is_none() {
            state.first_unacked_at = Some(now);
        }

        let immediate = (fin && self.config.immediate_on_fin)
            || (state.gap_detected && self.config.immediate_on_gap)
            || state.packets_since_ack >= self.config.ack_every_n_packets;

        if immediate {
            self.stats.acks_immediate += 1;
        } else {
            self.stats.acks_delayed += 1;
        }
        immediate
    }

    /// Streams whose delayed-ACK timer has expired.
    pub fn due_streams(&self, now: Instant) -> Vec<u64> {
        self.streams
            .iter()
            .filter(|(_, state)| {
                state.needs_ack
                    && state.first_unacked_at.is_some_and(|at| {
                        now.saturating_duration_since(at) >= self.config.max_ack_delay
                    })
            })
            .map(|(&stream_id, _)| stream_id)
            .collect()
    }

    /// The ACK frame a stream would emit now, if one is pending.
    pub fn pending_ack(&self, stream_id: u64) -> Option<AckFrame> {
        let state = self.streams.get(&stream_id)?;
        if !state.needs_ack {
            return None;
        }
        // needs_ack implies at least one received frame.
        let highest_ack = state.highest_received?;
        Some(AckFrame { stream_id, highest_ack, bitmap: state.received.bitmap() })
    }

    /// Mark a stream's pending ACK as emitted; resets counters and clears
    /// the gap flag.
    pub fn ack_sent(&mut self, stream_id: u64) {
        if let Some(state) = self.streams.get_mut(&stream_id) {
            if state.packets_since_ack > 1 {
                self.stats.acks_coalesced += (state.packets_since_ack - 1) as u64;
            }
            self.stats.acks_sent += 1;
            state.packets_since_ack = 0;
            state.needs_ack = false;
            state.gap_detected = false;
            state.first_unacked_at = None;
        }
    }

    /// Time until the earliest delayed ACK must go out, `None` when nothing
    /// is pending.
    pub fn time_until_next_ack(&self, now: Instant) -> Option<Duration> {
        self.streams
            .values()
            .filter(|state| state.needs_ack)
            .filter_map(|state| state.first_unacked_at)
            .map(|at| {
                let elapsed = now.saturating_duration_since(at);
                self.config.max_ack_delay.saturating_sub(elapsed)
            })
            .min()
    }

    /// Drop all state for a closed stream.
    pub fn reset_stream(&mut self, stream_id: u64) {
        self.streams.remove(&stream_id);
    }

    /// Emission counters.
    pub fn stats(&self) -> AckSchedulerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_marks_head_and_recent() {
        let mut bitmap = AckBitmap::new();
        bitmap.ack(10);
        assert!(bitmap.is_acked(10));
        assert!(!bitmap.is_acked(9));

        bitmap.ack(9);
        assert!(bitmap.is_acked(9));
        assert_eq!(bitmap.head(), 10);
    }

    #[test]
    fn bitmap_forward_shift_keeps_history() {
        let mut bitmap = AckBitmap::new();
        bitmap.ack(1);
        bitmap.ack(2);
        bitmap.ack(3);
        bitmap.ack(10);
        for seq in [1, 2, 3, 10] {
            assert!(bitmap.is_acked(seq), "sequence {seq}");
        }
        assert!(!bitmap.is_acked(4));
        assert!(!bitmap.is_acked(9));
    }

    #[test]
    fn bitmap_window_is_32_wide() {
        let mut bitmap = AckBitmap::new();
        bitmap.ack(100);
        bitmap.ack(100 - 32);
        assert!(bitmap.is_acked(100 - 32));
        // 33 back is outside the window: the ack is a no-op.
        bitmap.ack(100 - 33);
        assert!(!bitmap.is_acked(100 - 33));
    }

    #[test]
    fn bitmap_large_forward_jump_clears_window() {
        let mut bitmap = AckBitmap::new();
        bitmap.ack(1);
        bitmap.ack(2);
        bitmap.ack(1000);
        assert!(bitmap.is_acked(1000));
        assert!(!bitmap.is_acked(1));
        assert!(!bitmap.is_acked(2));
    }

    #[test]
    fn bitmap_wraparound_boundary() {
        let mut bitmap = AckBitmap::new();
        bitmap.ack(u64::MAX);
        bitmap.ack(0);
        assert!(bitmap.is_acked(0));
        assert!(bitmap.is_acked(u64::MAX));
        assert_eq!(bitmap.head(), 0);

        // Re-acking the old value across the boundary stays stable.
        bitmap.ack(u64::MAX);
        assert!(bitmap.is_acked(u64::MAX));
    }

    #[test]
    fn seq_less_than_handles_wraparound() {
        assert!(seq_less_than(u64::MAX, 0));
        assert!(!seq_less_than(0, u64::MAX));
        assert!(seq_less_than(1, 2));
        assert!(!seq_less_than(2, 2));
    }

    #[test]
    fn scheduler_immediate_on_fin() {
        let mut scheduler = AckScheduler::new(AckSchedulerConfig {
            ack_every_n_packets: 100,
            ..AckSchedulerConfig::default()
        });
        assert!(scheduler.on_frame_received(0, 1, true, Instant::now()));
        assert_eq!(scheduler.stats().acks_immediate, 1);
    }

    #[test]
    fn scheduler_immediate_on_gap() {
        let mut scheduler = AckScheduler::new(AckSchedulerConfig {
            ack_every_n_packets: 100,
            ..AckSchedulerConfig::default()
        });
        let now = Instant::now();
        assert!(!scheduler.on_frame_received(0, 1, false, now));
        // Sequence 3 skips 2: gap.
        assert!(scheduler.on_frame_received(0, 3, false, now));
        assert_eq!(scheduler.stats().gaps_detected, 1);
    }

    #[test]
    fn scheduler_detects_gap_on_stream_starting_at_zero() {
        let mut scheduler = AckScheduler::new(AckSchedulerConfig {
            ack_every_n_packets: 100,
            ..AckSchedulerConfig::default()
        });
        let now = Instant::now();
        assert!(!scheduler.on_frame_received(0, 0, false, now));
        // Sequence 2 skips 1: the very first gap on a fresh stream.
        assert!(scheduler.on_frame_received(0, 2, false, now));
        assert_eq!(scheduler.stats().gaps_detected, 1);

        let ack = scheduler.pending_ack(0).expect("pending ack");
        assert_eq!(ack.highest_ack, 2);
        assert!(ack.bitmap >> 1 & 1 != 0, "sequence 0 recorded two below the head");
    }

    #[test]
    fn scheduler_immediate_after_n_packets() {
        let mut scheduler = AckScheduler::new(AckSchedulerConfig::default());
        let now = Instant::now();
        assert!(!scheduler.on_frame_received(0, 1, false, now));
        assert!(scheduler.on_frame_received(0, 2, false, now));
    }

    #[test]
    fn scheduler_delayed_ack_fires_on_timer() {
        let config = AckSchedulerConfig { ack_every_n_packets: 100, ..AckSchedulerConfig::default() };
        let mut scheduler = AckScheduler::new(config);
        let start = Instant::now();
        scheduler.on_frame_received(5, 1, false, start);

        assert!(scheduler.due_streams(start).is_empty());
        let later = start + config.max_ack_delay;
        assert_eq!(scheduler.due_streams(later), vec![5]);

        let remaining = scheduler.time_until_next_ack(start).expect("pending");
        assert_eq!(remaining, config.max_ack_delay);
    }

    #[test]
    fn scheduler_emission_resets_state() {
        let mut scheduler = AckScheduler::new(AckSchedulerConfig::default());
        let now = Instant::now();
        scheduler.on_frame_received(0, 1, false, now);
        scheduler.on_frame_received(0, 2, false, now);

        let ack = scheduler.pending_ack(0).expect("pending ack");
        assert_eq!(ack.highest_ack, 2);
        assert!(ack.bitmap & 1 != 0, "previous sequence recorded in the bitmap");

        scheduler.ack_sent(0);
        assert!(scheduler.pending_ack(0).is_none());
        assert!(scheduler.due_streams(now + Duration::from_secs(1)).is_empty());
        assert_eq!(scheduler.stats().acks_sent, 1);
        assert_eq!(scheduler.stats().acks_coalesced, 1);
    }

    #[test]
    fn scheduler_streams_are_independent() {
        let mut scheduler = AckScheduler::new(AckSchedulerConfig::default());
        let now = Instant::now();
        scheduler.on_frame_received(1, 1, false, now);
        scheduler.on_frame_received(2, 1, false, now);
        assert!(scheduler.pending_ack(1).is_some());
        scheduler.ack_sent(1);
        assert!(scheduler.pending_ack(1).is_none());
        assert!(scheduler.pending_ack(2).is_some());
    }

    #[test]
    fn scheduler_reset_stream_forgets_state() {
        let mut scheduler = AckScheduler::new(AckSchedulerConfig::default());
        scheduler.on_frame_received(9, 4, false, Instant::now());
        scheduler.reset_stream(9);
        assert!(scheduler.pending_ack(9).is_none());
    }
}
