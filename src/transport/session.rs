//! The per-peer encrypted datagram endpoint.
//!
//! A `TransportSession` owns the session keys and every piece of per-peer
//! state: sequence counters, replay window, retransmit buffer, per-stream
//! reorder buffers, fragment reassembly, ACK scheduling, and the traffic
//! shaping profile. It is strictly single-owner: all methods take `&mut
//! self`, nothing inside is locked, and a debug-build checker panics on
//! cross-thread use.
//!
//! Time never comes from the ambient clock — every operation that cares
//! takes an explicit `now`, so schedules are pure functions of their inputs
//! and tests drive the clock by hand.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use crate::core::{
    AEAD_TAG_SIZE, CONTROL_TYPE_CUMULATIVE_ACK, CONTROL_TYPE_PADDING, MAX_PACKET_PAYLOAD,
    MetricsSink, NullMetrics, OsRandom, RandomSource, REPLAY_WINDOW_BITS,
    SESSION_ROTATION_INTERVAL, SESSION_ROTATION_PACKETS, TransportError,
    DEFAULT_MAX_FRAGMENT_SIZE, DEFAULT_MTU, FRAGMENT_TIMEOUT,
};
use crate::crypto::{
    SeqObfuscationKey, SessionKeys, deobfuscate_sequence, derive_nonce,
    derive_seq_obfuscation_key, obfuscate_sequence,
};
use crate::handshake::HandshakeSession;
use crate::obfuscation::{
    ObfuscationProfile, compute_heartbeat_interval, compute_prefix_size, compute_timing_jitter,
    generate_heartbeat_payload, padding_bytes, prefix_bytes,
};
use crate::transport::ack::{AckScheduler, AckSchedulerConfig, AckSchedulerStats};
use crate::transport::fragment::{Fragment, FragmentReassembly};
use crate::transport::frame::{
    AckFrame, ControlFrame, DataFrame, FragmentHeader, HeartbeatFrame, MuxFrame, decode_frames,
    encode_frames,
};
use crate::transport::packet::{PacketHeader, parse_packet};
use crate::transport::reorder::ReorderBuffer;
use crate::transport::replay_window::ReplayWindow;
use crate::transport::retransmit::{RetransmitBuffer, RetransmitConfig, RetransmitStats};
use crate::transport::stats::{WireMetrics, WireMetricsCollector};
use crate::util::ThreadChecker;

/// Tuning for one transport session.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Peer MTU hint for outgoing datagrams (advisory).
    pub mtu: usize,
    /// Largest DATA payload per packet; longer messages fragment.
    pub max_fragment_size: usize,
    /// Replay window size in bits.
    pub replay_window_bits: usize,
    /// Session-id rotation interval.
    pub rotation_interval: Duration,
    /// Sent packets that force a rotation.
    pub rotation_packets: u64,
    /// Byte budget per stream reorder buffer.
    pub reorder_buffer_bytes: usize,
    /// Byte budget per reassembling message.
    pub fragment_buffer_bytes: usize,
    /// Partial-message expiry.
    pub fragment_timeout: Duration,
    /// Retransmit buffer tuning.
    pub retransmit: RetransmitConfig,
    /// ACK emission policy.
    pub ack: AckSchedulerConfig,
    /// Traffic shaping profile.
    pub obfuscation: ObfuscationProfile,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
            replay_window_bits: REPLAY_WINDOW_BITS,
            rotation_interval: SESSION_ROTATION_INTERVAL,
            rotation_packets: SESSION_ROTATION_PACKETS,
            reorder_buffer_bytes: 1 << 20,
            fragment_buffer_bytes: 1 << 20,
            fragment_timeout: FRAGMENT_TIMEOUT,
            retransmit: RetransmitConfig::default(),
            ack: AckSchedulerConfig::default(),
            obfuscation: ObfuscationProfile::default(),
        }
    }
}

/// Monotonic counters for observability.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransportStats {
    /// Packets sealed and handed to the caller.
    pub packets_sent: u64,
    /// Packets accepted on the receive path.
    pub packets_received: u64,
    /// Datagram bytes produced.
    pub bytes_sent: u64,
    /// Datagram bytes accepted.
    pub bytes_received: u64,
    /// Receive drops: replay window.
    pub packets_dropped_replay: u64,
    /// Receive drops: authentication failure.
    pub packets_dropped_decrypt: u64,
    /// Receive drops: unparseable datagrams.
    pub packets_dropped_malformed: u64,
    /// DATA fragments sent.
    pub fragments_sent: u64,
    /// DATA fragments received.
    pub fragments_received: u64,
    /// Messages completed by reassembly.
    pub messages_reassembled: u64,
    /// Packets retransmitted.
    pub retransmits: u64,
    /// Session-id rotations performed.
    pub session_rotations: u64,
    /// Heartbeats emitted.
    pub heartbeats_sent: u64,
    /// Heartbeats received.
    pub heartbeats_received: u64,
    /// ACK frames emitted.
    pub acks_sent: u64,
}

/// Encrypted datagram endpoint for one peer.
pub struct TransportSession {
    config: TransportConfig,

    keys: SessionKeys,
    session_id: u64,
    send_seq_obf: SeqObfuscationKey,
    recv_seq_obf: SeqObfuscationKey,

    // Nonce input. MUST NEVER reset, including across session-id rotation:
    // a repeated value would reuse an AEAD nonce under the same key.
    send_sequence: u64,

    replay_window: ReplayWindow,

    last_rotation: Instant,
    packets_since_rotation: u64,

    ack_scheduler: AckScheduler,
    immediate_ack_streams: BTreeSet<u64>,
    reorder: HashMap<u64, ReorderBuffer>,
    reassembly: FragmentReassembly,
    retransmit: RetransmitBuffer,

    // Selective ACKs speak per-stream DATA sequences; the retransmit buffer
    // is keyed by outer packet sequence. These maps translate.
    data_index: HashMap<(u64, u64), u64>,
    in_flight: HashMap<u64, (u64, u64)>,

    stream_send_seq: HashMap<u64, u64>,
    message_id_counter: u64,

    session_start: Instant,
    last_activity: Instant,
    next_heartbeat_at: Option<Instant>,
    heartbeat_count: u64,

    reassembled: Vec<(u64, Vec<u8>)>,

    stats: TransportStats,
    wire_metrics: WireMetricsCollector,
    rng: Box<dyn RandomSource>,
    metrics: Box<dyn MetricsSink>,
    checker: ThreadChecker,
}

impl TransportSession {
    /// Build a session from a completed handshake, with OS randomness and no
    /// metrics mirroring.
    pub fn new(handshake: HandshakeSession, config: TransportConfig, now: Instant) -> Self {
        Self::with_parts(handshake, config, now, Box::new(OsRandom), Box::new(NullMetrics))
    }

    /// Build a session with explicit injected dependencies.
    pub fn with_parts(
        handshake: HandshakeSession,
        config: TransportConfig,
        now: Instant,
        rng: Box<dyn RandomSource>,
        metrics: Box<dyn MetricsSink>,
    ) -> Self {
        let HandshakeSession { session_id, keys, .. } = handshake;
        let send_seq_obf = derive_seq_obfuscation_key(keys.send_key(), keys.send_base_nonce());
        let recv_seq_obf = derive_seq_obfuscation_key(keys.recv_key(), keys.recv_base_nonce());

        Self {
            replay_window: ReplayWindow::new(config.replay_window_bits),
            ack_scheduler: AckScheduler::new(config.ack),
            reassembly: FragmentReassembly::new(
                config.fragment_buffer_bytes,
                config.fragment_timeout,
            ),
            retransmit: RetransmitBuffer::new(config.retransmit),
            config,
            keys,
            session_id,
            send_seq_obf,
            recv_seq_obf,
            send_sequence: 0,
            last_rotation: now,
            packets_since_rotation: 0,
            immediate_ack_streams: BTreeSet::new(),
            reorder: HashMap::new(),
            data_index: HashMap::new(),
            in_flight: HashMap::new(),
            stream_send_seq: HashMap::new(),
            message_id_counter: 0,
            session_start: now,
            last_activity: now,
            next_heartbeat_at: None,
            heartbeat_count: 0,
            reassembled: Vec::new(),
            stats: TransportStats::default(),
            wire_metrics: WireMetricsCollector::new(),
            rng,
            metrics,
            checker: ThreadChecker::new(),
        }
    }

    // =========================================================================
    // Send path
    // =========================================================================

    /// Seal application bytes into one or more datagrams.
    ///
    /// Plaintext longer than the fragment size is split into fragments under
    /// a fresh message id; only the final fragment carries FIN. The returned
    /// datagrams include the obfuscation prefix and are ready for the wire.
    pub fn encrypt_data(
        &mut self,
        plaintext: &[u8],
        stream_id: u64,
        fin: bool,
        now: Instant,
    ) -> Result<Vec<Vec<u8>>, TransportError> {
        self.checker.check();

        let frames = self.build_data_frames(plaintext, stream_id, fin);
        let mut packets = Vec::with_capacity(frames.len());
        for frame in frames {
            let tracked = match &frame {
                MuxFrame::Data(data) => Some((data.stream_id, data.sequence)),
                _ => None,
            };
            packets.push(self.seal_packet(frame, tracked, now)?);
        }
        Ok(packets)
    }

    /// Close a stream: an empty FIN DATA frame through the normal send path.
    pub fn close_stream(
        &mut self,
        stream_id: u64,
        now: Instant,
    ) -> Result<Vec<Vec<u8>>, TransportError> {
        self.encrypt_data(&[], stream_id, true, now)
    }

    // Largest DATA payload per packet: the configured fragment size, capped
    // by what the peer MTU hint leaves after fixed framing overhead.
    fn effective_fragment_size(&self) -> usize {
        let overhead = crate::core::PACKET_HEADER_SIZE
            + crate::core::DATA_FRAME_HEADER_SIZE
            + crate::core::FRAGMENT_HEADER_SIZE
            + AEAD_TAG_SIZE
            + self.config.obfuscation.max_prefix;
        self.config.max_fragment_size.min(self.config.mtu.saturating_sub(overhead)).max(1)
    }

    fn build_data_frames(&mut self, plaintext: &[u8], stream_id: u64, fin: bool) -> Vec<MuxFrame> {
        if plaintext.len() <= self.effective_fragment_size() {
            let sequence = self.next_stream_sequence(stream_id);
            return vec![MuxFrame::Data(DataFrame {
                stream_id,
                sequence,
                fin,
                fragment: None,
                payload: plaintext.to_vec(),
            })];
        }

        let message_id = self.message_id_counter;
        self.message_id_counter += 1;

        let chunks: Vec<&[u8]> = plaintext.chunks(self.effective_fragment_size()).collect();
        let last_index = chunks.len() - 1;
        let mut frames = Vec::with_capacity(chunks.len());
        let mut offset = 0u32;
        for (index, chunk) in chunks.into_iter().enumerate() {
            let sequence = self.next_stream_sequence(stream_id);
            let last = index == last_index;
            frames.push(MuxFrame::Data(DataFrame {
                stream_id,
                sequence,
                fin: fin && last,
                fragment: Some(FragmentHeader { message_id, offset, last }),
                payload: chunk.to_vec(),
            }));
            offset += chunk.len() as u32;
            self.stats.fragments_sent += 1;
        }
        frames
    }

    fn next_stream_sequence(&mut self, stream_id: u64) -> u64 {
        let counter = self.stream_send_seq.entry(stream_id).or_insert(0);
        let sequence = *counter;
        *counter += 1;
        sequence
    }

    // Seal one frame (plus profile padding) into a wire datagram.
    fn seal_packet(
        &mut self,
        frame: MuxFrame,
        tracked: Option<(u64, u64)>,
        now: Instant,
    ) -> Result<Vec<u8>, TransportError> {
        if self.send_sequence == u64::MAX {
            return Err(TransportError::SequenceExhausted);
        }
        let sequence = self.send_sequence;
        let is_heartbeat = matches!(frame, MuxFrame::Heartbeat(_));

        let mut frames = vec![frame];
        let padding = padding_bytes(&self.config.obfuscation, sequence);
        let padding_len = padding.len();
        if !padding.is_empty() {
            frames.push(MuxFrame::Control(ControlFrame {
                control_type: CONTROL_TYPE_PADDING,
                payload: padding,
            }));
        }

        let area = encode_frames(&frames);
        if area.len() + AEAD_TAG_SIZE > MAX_PACKET_PAYLOAD {
            return Err(TransportError::PayloadTooLarge);
        }

        let header = PacketHeader {
            flags: 0,
            session_id: self.session_id,
            sequence: obfuscate_sequence(sequence, &self.send_seq_obf),
            frame_count: frames.len() as u8,
            payload_len: (area.len() + AEAD_TAG_SIZE) as u16,
        };
        let nonce = derive_nonce(self.keys.send_base_nonce(), sequence);
        let ciphertext = crate::crypto::seal(self.keys.send_key(), &nonce, &header.aad(), &area);

        let prefix = prefix_bytes(&self.config.obfuscation, sequence);
        let prefix_len = prefix.len();
        let mut datagram = Vec::with_capacity(prefix.len() + header.to_bytes().len() + ciphertext.len());
        datagram.extend_from_slice(&prefix);
        datagram.extend_from_slice(&header.to_bytes());
        datagram.extend_from_slice(&ciphertext);

        if let Some(key) = tracked {
            if !self.retransmit.insert(sequence, datagram.clone(), now) {
                return Err(TransportError::RetransmitBufferFull);
            }
            self.data_index.insert(key, sequence);
            self.in_flight.insert(sequence, key);
        }

        self.send_sequence += 1;
        self.packets_since_rotation += 1;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += datagram.len() as u64;
        self.wire_metrics.record_packet_sent(datagram.len(), padding_len, prefix_len, is_heartbeat);
        Ok(datagram)
    }

    /// Deterministic send delay for a packet's wire shaping.
    pub fn send_delay(&self, sequence: u64) -> Duration {
        compute_timing_jitter(&self.config.obfuscation, sequence)
    }

    // =========================================================================
    // Receive path
    // =========================================================================

    /// Open one datagram and dispatch its frames.
    ///
    /// `None` is the silent drop: malformed bytes, replays, and
    /// authentication failures are indistinguishable to the sender and only
    /// visible in [`stats`](Self::stats).
    pub fn decrypt_packet(&mut self, datagram: &[u8], now: Instant) -> Option<Vec<MuxFrame>> {
        self.checker.check();

        let mut parsed_any = false;
        for candidate in self.prefix_candidates() {
            if datagram.len() <= candidate {
                continue;
            }
            let Some((header, ciphertext)) = parse_packet(&datagram[candidate..]) else {
                continue;
            };
            parsed_any = true;

            let sequence = deobfuscate_sequence(header.sequence, &self.recv_seq_obf);
            if self.config.obfuscation.enabled
                && compute_prefix_size(&self.config.obfuscation, sequence) != candidate
            {
                continue;
            }

            if self.replay_window.is_replay(sequence) {
                self.stats.packets_dropped_replay += 1;
                self.metrics.increment("veil.transport.drop.replay", 1);
                tracing::trace!(sequence, "replayed packet dropped");
                return None;
            }

            let nonce = derive_nonce(self.keys.recv_base_nonce(), sequence);
            let Some(area) =
                crate::crypto::open(self.keys.recv_key(), &nonce, &header.aad(), ciphertext)
            else {
                continue;
            };

            let Some(frames) = decode_frames(&area, header.frame_count) else {
                // Authenticated but structurally invalid: a peer bug.
                self.stats.packets_dropped_malformed += 1;
                self.metrics.increment("veil.transport.drop.malformed", 1);
                return None;
            };

            self.replay_window.check_and_set(sequence);
            self.stats.packets_received += 1;
            self.stats.bytes_received += datagram.len() as u64;
            self.wire_metrics.record_packet_received(datagram.len(), now);
            self.last_activity = now;
            self.dispatch_frames(&frames, now);
            return Some(frames);
        }

        if parsed_any {
            self.stats.packets_dropped_decrypt += 1;
            self.metrics.increment("veil.transport.drop.decrypt", 1);
            tracing::trace!("packet failed authentication, dropped");
        } else {
            self.stats.packets_dropped_malformed += 1;
            self.metrics.increment("veil.transport.drop.malformed", 1);
        }
        None
    }

    // Candidate prefix lengths to strip before the header. With shaping off
    // the only candidate is zero; with it on, every size the profile can
    // produce is tried and validated against the de-obfuscated sequence.
    fn prefix_candidates(&self) -> std::ops::RangeInclusive<usize> {
        if self.config.obfuscation.enabled {
            self.config.obfuscation.min_prefix..=self.config.obfuscation.max_prefix
        } else {
            0..=0
        }
    }

    fn dispatch_frames(&mut self, frames: &[MuxFrame], now: Instant) {
        for frame in frames {
            match frame {
                MuxFrame::Data(data) => self.on_data_frame(data, now),
                MuxFrame::Ack(ack) => self.process_ack(ack, now),
                MuxFrame::Control(control) => self.on_control_frame(control, now),
                MuxFrame::Heartbeat(heartbeat) => self.on_heartbeat_frame(heartbeat),
            }
        }
    }

    fn on_data_frame(&mut self, data: &DataFrame, now: Instant) {
        if self
            .ack_scheduler
            .on_frame_received(data.stream_id, data.sequence, data.fin, now)
        {
            self.immediate_ack_streams.insert(data.stream_id);
        }

        match &data.fragment {
            Some(fragment) => {
                self.stats.fragments_received += 1;
                self.reassembly.push(
                    fragment.message_id,
                    Fragment {
                        offset: fragment.offset,
                        data: data.payload.clone(),
                        last: fragment.last,
                    },
                    now,
                );
                if let Some(message) = self.reassembly.try_reassemble(fragment.message_id) {
                    self.stats.messages_reassembled += 1;
                    self.reassembled.push((data.stream_id, message));
                }
            }
            None => {
                let budget = self.config.reorder_buffer_bytes;
                self.reorder
                    .entry(data.stream_id)
                    .or_insert_with(|| ReorderBuffer::new(0, budget))
                    .push(data.sequence, data.payload.clone());
            }
        }
    }

    fn on_control_frame(&mut self, control: &ControlFrame, now: Instant) {
        match control.control_type {
            CONTROL_TYPE_PADDING => {}
            CONTROL_TYPE_CUMULATIVE_ACK => {
                if let Ok(bytes) = <[u8; 8]>::try_from(control.payload.as_slice()) {
                    let up_to = u64::from_be_bytes(bytes);
                    self.retransmit.acknowledge_cumulative(up_to, now);
                    self.prune_in_flight();
                }
            }
            _ => {
                tracing::trace!(control_type = control.control_type, "reserved control frame");
            }
        }
    }

    fn on_heartbeat_frame(&mut self, _heartbeat: &HeartbeatFrame) {
        self.stats.heartbeats_received += 1;
    }

    /// Consume a selective ACK: acknowledge the highest sequence and every
    /// bitmap bit against the retransmit buffer.
    pub fn process_ack(&mut self, ack: &AckFrame, now: Instant) {
        self.checker.check();
        self.acknowledge_stream_sequence(ack.stream_id, ack.highest_ack, now);
        for bit in 0..32u32 {
            if ack.bitmap >> bit & 1 != 0 {
                let sequence = ack.highest_ack.wrapping_sub(u64::from(bit) + 1);
                self.acknowledge_stream_sequence(ack.stream_id, sequence, now);
            }
        }
    }

    fn acknowledge_stream_sequence(&mut self, stream_id: u64, data_seq: u64, now: Instant) {
        if let Some(outer) = self.data_index.remove(&(stream_id, data_seq)) {
            self.in_flight.remove(&outer);
            self.retransmit.acknowledge(outer, now);
        }
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Next in-order payload for a stream, if available.
    pub fn pop_stream(&mut self, stream_id: u64) -> Option<Vec<u8>> {
        self.reorder.get_mut(&stream_id)?.pop_next()
    }

    /// Take every message completed by fragment reassembly since the last
    /// call, as `(stream_id, message)` pairs.
    pub fn take_reassembled(&mut self) -> Vec<(u64, Vec<u8>)> {
        std::mem::take(&mut self.reassembled)
    }

    // =========================================================================
    // Timer-driven work
    // =========================================================================

    /// Produce everything that must go on the wire at `now`: due
    /// retransmits, due or immediate ACKs, and a heartbeat when its gap has
    /// elapsed. Heartbeats flow whether or not data does.
    pub fn tick(&mut self, now: Instant) -> Vec<Vec<u8>> {
        self.checker.check();
        let mut out = Vec::new();

        self.prune_in_flight();

        for sequence in self.retransmit.packets_to_retransmit(now) {
            if self.retransmit.mark_retransmitted(sequence, now) {
                let bytes =
                    self.retransmit.get(sequence).expect("entry survives marking").bytes.clone();
                self.stats.retransmits += 1;
                out.push(bytes);
            } else if let Some(key) = self.in_flight.remove(&sequence) {
                self.data_index.remove(&key);
            }
        }

        let mut ack_streams = std::mem::take(&mut self.immediate_ack_streams);
        ack_streams.extend(self.ack_scheduler.due_streams(now));
        for stream_id in ack_streams {
            if let Some(ack) = self.ack_scheduler.pending_ack(stream_id) {
                if let Ok(packet) = self.seal_packet(MuxFrame::Ack(ack), None, now) {
                    self.ack_scheduler.ack_sent(stream_id);
                    self.stats.acks_sent += 1;
                    out.push(packet);
                }
            }
        }

        if let Some(packet) = self.heartbeat_due(now) {
            out.push(packet);
        }

        self.reassembly.sweep_expired(now);
        out
    }

    fn heartbeat_due(&mut self, now: Instant) -> Option<Vec<u8>> {
        if !self.config.obfuscation.enabled {
            return None;
        }
        let next = *self.next_heartbeat_at.get_or_insert_with(|| {
            now + compute_heartbeat_interval(&self.config.obfuscation, 0)
        });
        if now < next {
            return None;
        }

        let timestamp = now.saturating_duration_since(self.session_start).as_millis() as u64;
        let payload = generate_heartbeat_payload(
            self.config.obfuscation.heartbeat_payload,
            &self.config.obfuscation.seed,
            self.heartbeat_count,
            timestamp,
        );
        let frame = MuxFrame::Heartbeat(HeartbeatFrame {
            timestamp,
            sequence: self.heartbeat_count,
            payload,
        });
        let packet = self.seal_packet(frame, None, now).ok()?;

        self.heartbeat_count += 1;
        self.next_heartbeat_at =
            Some(now + compute_heartbeat_interval(&self.config.obfuscation, self.heartbeat_count));
        self.stats.heartbeats_sent += 1;
        Some(packet)
    }

    // Index entries whose packet left the retransmit buffer by eviction are
    // stale; drop them so the maps stay bounded by the buffer.
    fn prune_in_flight(&mut self) {
        if self.in_flight.len() == self.retransmit.pending_count() {
            return;
        }
        let retransmit = &self.retransmit;
        let data_index = &mut self.data_index;
        self.in_flight.retain(|sequence, key| {
            if retransmit.get(*sequence).is_some() {
                true
            } else {
                data_index.remove(key);
                false
            }
        });
    }

    // =========================================================================
    // Rotation and introspection
    // =========================================================================

    /// Whether the rotation interval or packet budget has been reached.
    pub fn should_rotate(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_rotation) >= self.config.rotation_interval
            || self.packets_since_rotation >= self.config.rotation_packets
    }

    /// Rotate the wire-visible session id.
    ///
    /// This changes the demultiplexer and NOTHING else. Keys, base nonces,
    /// the send sequence, and the replay window all continue: resetting the
    /// sequence would reuse an AEAD nonce and destroy confidentiality.
    pub fn rotate_session(&mut self, now: Instant) {
        self.checker.check();
        self.session_id = self.rng.next_u64();
        self.last_rotation = now;
        self.packets_since_rotation = 0;
        self.stats.session_rotations += 1;
        self.metrics.increment("veil.transport.rotations", 1);
        tracing::debug!("session id rotated");
    }

    /// Current wire-visible session id.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Next outer sequence to be consumed.
    pub fn send_sequence(&self) -> u64 {
        self.send_sequence
    }

    /// When the last authenticated packet arrived.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Whether nothing authenticated has arrived within `dead_interval`.
    pub fn is_idle(&self, now: Instant, dead_interval: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= dead_interval
    }

    /// Session counters.
    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    /// Retransmit buffer counters.
    pub fn retransmit_stats(&self) -> RetransmitStats {
        self.retransmit.stats()
    }

    /// ACK scheduler counters.
    pub fn ack_stats(&self) -> AckSchedulerStats {
        self.ack_scheduler.stats()
    }

    /// Wire-shape distributions for DPI-resistance validation.
    pub fn wire_metrics(&self) -> WireMetrics {
        self.wire_metrics.snapshot()
    }

    /// Generate the pending ACK frame for a stream without sending it.
    pub fn generate_ack(&mut self, stream_id: u64) -> Option<AckFrame> {
        self.checker.check();
        self.ack_scheduler.pending_ack(stream_id)
    }
}
