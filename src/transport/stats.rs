//! Wire-shape metrics for validating DPI resistance.
//!
//! Padding and prefixes only help if the resulting size and timing
//! distributions actually look flat; this collector keeps the running
//! distributions an operator needs to check that, without storing per-packet
//! history. It is owned by a single session and shares its no-locking
//! contract.

use std::time::Instant;

/// Histogram bucket count; sizes bucket by 64 bytes, gaps by 10 ms.
const HISTOGRAM_BUCKETS: usize = 16;

/// Width of one packet-size bucket in bytes.
const SIZE_BUCKET_BYTES: usize = 64;

/// Width of one inter-arrival bucket in milliseconds.
const GAP_BUCKET_MS: u64 = 10;

// Running mean and variance without per-sample storage (Welford).
#[derive(Debug, Default, Clone, Copy)]
struct RunningDistribution {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningDistribution {
    fn record(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn stddev(&self) -> f64 {
        if self.count < 2 { 0.0 } else { (self.m2 / (self.count - 1) as f64).sqrt() }
    }
}

/// A point-in-time summary of the wire shape.
#[derive(Debug, Default, Clone)]
pub struct WireMetrics {
    /// Mean sent-datagram size in bytes.
    pub mean_packet_size: f64,
    /// Standard deviation of sent-datagram sizes.
    pub packet_size_stddev: f64,
    /// Smallest sent datagram.
    pub min_packet_size: usize,
    /// Largest sent datagram.
    pub max_packet_size: usize,
    /// Sent-size histogram in 64-byte buckets (last bucket is open-ended).
    pub packet_size_histogram: [u64; HISTOGRAM_BUCKETS],

    /// Mean gap between received datagrams in milliseconds.
    pub mean_inter_arrival_ms: f64,
    /// Standard deviation of receive gaps.
    pub inter_arrival_stddev_ms: f64,
    /// Receive-gap histogram in 10 ms buckets (last bucket is open-ended).
    pub inter_arrival_histogram: [u64; HISTOGRAM_BUCKETS],

    /// Filler bytes spent on in-packet padding.
    pub total_padding_bytes: u64,
    /// Filler bytes spent on pre-header prefixes.
    pub total_prefix_bytes: u64,
    /// Mean padding per sent packet.
    pub avg_padding_per_packet: f64,
    /// Mean prefix per sent packet.
    pub avg_prefix_per_packet: f64,

    /// Datagrams sent.
    pub packets_sent: u64,
    /// Datagrams received.
    pub packets_received: u64,
    /// Heartbeats among the sent datagrams.
    pub heartbeats_sent: u64,
    /// Share of sent datagrams that were heartbeats.
    pub heartbeat_ratio: f64,
}

/// Accumulates wire-shape observations for one session.
#[derive(Debug, Default)]
pub struct WireMetricsCollector {
    sent_sizes: RunningDistribution,
    size_histogram: [u64; HISTOGRAM_BUCKETS],
    inter_arrival: RunningDistribution,
    gap_histogram: [u64; HISTOGRAM_BUCKETS],
    last_arrival: Option<Instant>,
    total_padding_bytes: u64,
    total_prefix_bytes: u64,
    packets_sent: u64,
    packets_received: u64,
    heartbeats_sent: u64,
}

impl WireMetricsCollector {
    /// An empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sent datagram and its shaping overhead.
    pub fn record_packet_sent(
        &mut self,
        size: usize,
        padding_bytes: usize,
        prefix_bytes: usize,
        is_heartbeat: bool,
    ) {
        self.packets_sent += 1;
        self.sent_sizes.record(size as f64);
        let bucket = (size / SIZE_BUCKET_BYTES).min(HISTOGRAM_BUCKETS - 1);
        self.size_histogram[bucket] += 1;
        self.total_padding_bytes += padding_bytes as u64;
        self.total_prefix_bytes += prefix_bytes as u64;
        if is_heartbeat {
            self.heartbeats_sent += 1;
        }
    }

    /// Record one accepted datagram arrival.
    pub fn record_packet_received(&mut self, _size: usize, now: Instant) {
        self.packets_received += 1;
        if let Some(last) = self.last_arrival {
            let gap_ms = now.saturating_duration_since(last).as_secs_f64() * 1000.0;
            self.inter_arrival.record(gap_ms);
            let bucket = ((gap_ms as u64) / GAP_BUCKET_MS).min(HISTOGRAM_BUCKETS as u64 - 1);
            self.gap_histogram[bucket as usize] += 1;
        }
        self.last_arrival = Some(now);
    }

    /// Current summary.
    pub fn snapshot(&self) -> WireMetrics {
        let sent = self.packets_sent.max(1) as f64;
        WireMetrics {
            mean_packet_size: self.sent_sizes.mean(),
            packet_size_stddev: self.sent_sizes.stddev(),
            min_packet_size: if self.packets_sent == 0 { 0 } else { self.sent_sizes.min as usize },
            max_packet_size: self.sent_sizes.max as usize,
            packet_size_histogram: self.size_histogram,
            mean_inter_arrival_ms: self.inter_arrival.mean(),
            inter_arrival_stddev_ms: self.inter_arrival.stddev(),
            inter_arrival_histogram: self.gap_histogram,
            total_padding_bytes: self.total_padding_bytes,
            total_prefix_bytes: self.total_prefix_bytes,
            avg_padding_per_packet: self.total_padding_bytes as f64 / sent,
            avg_prefix_per_packet: self.total_prefix_bytes as f64 / sent,
            packets_sent: self.packets_sent,
            packets_received: self.packets_received,
            heartbeats_sent: self.heartbeats_sent,
            heartbeat_ratio: self.heartbeats_sent as f64 / sent,
        }
    }
}
