//! Heartbeat payload generators.
//!
//! Heartbeats keep the tunnel's traffic pattern alive when no data flows.
//! Each profile picks one mimic kind; the generator for that kind produces
//! payloads that are structurally valid for the protocol being imitated, so
//! a classifier that parses the bytes sees a plausible message rather than
//! uniform noise. Payload material is drawn from the profile PRF, keyed by
//! the heartbeat sequence, which keeps generation deterministic per packet.

use crate::obfuscation::prf::PrfStream;

/// What a heartbeat payload pretends to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPayloadKind {
    /// No payload at all.
    Empty,
    /// Eight-byte big-endian timestamp.
    Timestamp,
    /// JSON sensor reading, like a home-automation check-in.
    IotSensor,
    /// Compact TLV telemetry record.
    Telemetry,
    /// A well-formed DNS response for an A query.
    DnsResponse,
    /// A well-formed STUN Binding Success response.
    Stun,
    /// A well-formed RTP v2 packet with audio-sized payload.
    Rtp,
    /// Unstructured bytes of PRF-chosen length.
    RandomSize,
}

/// Generate the payload for heartbeat number `hb_seq`.
pub fn generate_heartbeat_payload(
    kind: HeartbeatPayloadKind,
    seed: &[u8],
    hb_seq: u64,
    timestamp_ms: u64,
) -> Vec<u8> {
    match kind {
        HeartbeatPayloadKind::Empty => Vec::new(),
        HeartbeatPayloadKind::Timestamp => timestamp_ms.to_be_bytes().to_vec(),
        HeartbeatPayloadKind::IotSensor => iot_sensor(seed, hb_seq, timestamp_ms),
        HeartbeatPayloadKind::Telemetry => telemetry(seed, hb_seq),
        HeartbeatPayloadKind::DnsResponse => dns_response(seed, hb_seq),
        HeartbeatPayloadKind::Stun => stun_binding_response(seed, hb_seq),
        HeartbeatPayloadKind::Rtp => rtp_packet(seed, hb_seq, timestamp_ms),
        HeartbeatPayloadKind::RandomSize => random_size(seed, hb_seq),
    }
}

fn iot_sensor(seed: &[u8], hb_seq: u64, timestamp_ms: u64) -> Vec<u8> {
    let mut stream = PrfStream::new(seed, hb_seq, b"hb-iot");
    let device = stream.next_range(100, 999);
    let temperature = 15.0 + stream.next_range(0, 200) as f64 / 10.0;
    let humidity = 30.0 + stream.next_range(0, 500) as f64 / 10.0;
    let battery = stream.next_range(20, 100);
    format!(
        "{{\"dev\":\"sensor-{device}\",\"t\":{temperature:.1},\"h\":{humidity:.1},\"bat\":{battery},\"ts\":{timestamp_ms}}}"
    )
    .into_bytes()
}

fn telemetry(seed: &[u8], hb_seq: u64) -> Vec<u8> {
    let mut stream = PrfStream::new(seed, hb_seq, b"hb-telemetry");
    let records = stream.next_range(2, 5) as u8;
    let mut out = vec![records];
    for _ in 0..records {
        out.push(stream.next_range(1, 8) as u8); // record type
        out.push(4); // fixed 4-byte value
        out.extend_from_slice(&stream.next_u32().to_be_bytes());
    }
    out
}

/// Build a DNS response: header, one question, one A answer.
///
/// The question name is a PRF-chosen lowercase label under `.com`, and the
/// answer uses a compression pointer back to it, exactly as real resolvers
/// emit. The result parses as a NOERROR response in any DNS dissector.
fn dns_response(seed: &[u8], hb_seq: u64) -> Vec<u8> {
    let mut stream = PrfStream::new(seed, hb_seq, b"hb-dns");
    let mut out = Vec::with_capacity(64);

    // Header: id, flags QR|RD|RA NOERROR, 1 question, 1 answer.
    out.extend_from_slice(&stream.next_u16().to_be_bytes());
    out.extend_from_slice(&0x8180u16.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());

    // Question: <label>.com A IN.
    let label_len = stream.next_range(4, 10) as u8;
    out.push(label_len);
    for _ in 0..label_len {
        out.push(b'a' + (stream.next_byte() % 26));
    }
    out.push(3);
    out.extend_from_slice(b"com");
    out.push(0);
    out.extend_from_slice(&1u16.to_be_bytes()); // QTYPE A
    out.extend_from_slice(&1u16.to_be_bytes()); // QCLASS IN

    // Answer: pointer to offset 12, A IN, TTL, 4-byte address.
    out.extend_from_slice(&0xC00Cu16.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&(stream.next_range(60, 3600) as u32).to_be_bytes());
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(&stream.next_u32().to_be_bytes());

    out
}

/// Build a STUN Binding Success response (RFC 5389 framing).
fn stun_binding_response(seed: &[u8], hb_seq: u64) -> Vec<u8> {
    let mut stream = PrfStream::new(seed, hb_seq, b"hb-stun");
    let mut out = Vec::with_capacity(32);

    out.extend_from_slice(&0x0101u16.to_be_bytes()); // Binding Success
    out.extend_from_slice(&12u16.to_be_bytes()); // message length
    out.extend_from_slice(&0x2112A442u32.to_be_bytes()); // magic cookie
    out.extend_from_slice(&stream.take(12)); // transaction id

    // XOR-MAPPED-ADDRESS, IPv4.
    out.extend_from_slice(&0x0020u16.to_be_bytes());
    out.extend_from_slice(&8u16.to_be_bytes());
    out.push(0x00);
    out.push(0x01); // family IPv4
    out.extend_from_slice(&stream.next_u16().to_be_bytes()); // x-port
    out.extend_from_slice(&stream.next_u32().to_be_bytes()); // x-address

    out
}

/// Build an RTP v2 packet with a dynamic payload type.
fn rtp_packet(seed: &[u8], hb_seq: u64, timestamp_ms: u64) -> Vec<u8> {
    let mut stream = PrfStream::new(seed, hb_seq, b"hb-rtp");
    let mut out = Vec::with_capacity(180);

    out.push(0x80); // V=2, no padding, no extension, no CSRC
    out.push(96 + (stream.next_byte() % 32)); // dynamic payload type
    out.extend_from_slice(&(hb_seq as u16).to_be_bytes());
    // 8 kHz audio clock.
    out.extend_from_slice(&((timestamp_ms.wrapping_mul(8)) as u32).to_be_bytes());
    out.extend_from_slice(&stream.next_u32().to_be_bytes()); // SSRC

    let payload_len = stream.next_range(20, 160) as usize;
    out.extend_from_slice(&stream.take(payload_len));
    out
}

fn random_size(seed: &[u8], hb_seq: u64) -> Vec<u8> {
    let mut stream = PrfStream::new(seed, hb_seq, b"hb-random");
    let len = stream.next_range(16, 256) as usize;
    stream.take(len)
}
