//! Outer wire packet codec.
//!
//! Post-prefix layout, all integers big-endian:
//!
//! ```text
//! magic(2) | version(1) | flags(1) | session_id(8) | sequence(8)
//! | frame_count(1) | payload_len(2) | frame area (payload_len bytes)
//! ```
//!
//! At the transport layer the frame area is AEAD ciphertext (mux frames plus
//! tag) and the header is the associated data — with the session-id field
//! zeroed, so a session-id rotation does not invalidate packets already in
//! flight. The sequence field carries the obfuscated value on the wire.

use crate::core::{MAX_PACKET_PAYLOAD, PACKET_HEADER_SIZE, PACKET_MAGIC, PROTOCOL_VERSION};
use crate::transport::frame::{MuxFrame, decode_frames, encode_frames};

/// Parsed outer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Reserved flag bits.
    pub flags: u8,
    /// Wire-visible session id.
    pub session_id: u64,
    /// Wire-visible (obfuscated) sequence.
    pub sequence: u64,
    /// Number of frames in the sealed area.
    pub frame_count: u8,
    /// Byte length of the frame area.
    pub payload_len: u16,
}

impl PacketHeader {
    /// Serialize to the 23-byte wire form.
    pub fn to_bytes(&self) -> [u8; PACKET_HEADER_SIZE] {
        let mut out = [0u8; PACKET_HEADER_SIZE];
        out[..2].copy_from_slice(&PACKET_MAGIC);
        out[2] = PROTOCOL_VERSION;
        out[3] = self.flags;
        out[4..12].copy_from_slice(&self.session_id.to_be_bytes());
        out[12..20].copy_from_slice(&self.sequence.to_be_bytes());
        out[20] = self.frame_count;
        out[21..23].copy_from_slice(&self.payload_len.to_be_bytes());
        out
    }

    /// The AEAD associated data: the header with the session-id zeroed.
    pub fn aad(&self) -> [u8; PACKET_HEADER_SIZE] {
        let mut aad = self.to_bytes();
        aad[4..12].fill(0);
        aad
    }
}

/// Parse a header and return it with the frame area.
///
/// Checks magic, version, the payload bound, and that the buffer holds
/// exactly `payload_len` bytes after the header. `None` on any mismatch.
pub fn parse_packet(buf: &[u8]) -> Option<(PacketHeader, &[u8])> {
    if buf.len() < PACKET_HEADER_SIZE {
        return None;
    }
    if buf[..2] != PACKET_MAGIC || buf[2] != PROTOCOL_VERSION {
        return None;
    }
    let header = PacketHeader {
        flags: buf[3],
        session_id: u64::from_be_bytes(buf[4..12].try_into().expect("fixed slice")),
        sequence: u64::from_be_bytes(buf[12..20].try_into().expect("fixed slice")),
        frame_count: buf[20],
        payload_len: u16::from_be_bytes([buf[21], buf[22]]),
    };
    if header.payload_len as usize > MAX_PACKET_PAYLOAD {
        return None;
    }
    if buf.len() != PACKET_HEADER_SIZE + header.payload_len as usize {
        return None;
    }
    Some((header, &buf[PACKET_HEADER_SIZE..]))
}

/// A packet in its unsealed form, used below the AEAD layer and in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Reserved flag bits.
    pub flags: u8,
    /// Session id.
    pub session_id: u64,
    /// Packet sequence (plain, not obfuscated).
    pub sequence: u64,
    /// Frames in the payload area.
    pub frames: Vec<MuxFrame>,
}

/// Serialize an unsealed packet (header + plaintext frame area).
///
/// Returns `None` when the frame count or payload size exceeds the format.
pub fn encode_packet(packet: &Packet) -> Option<Vec<u8>> {
    if packet.frames.len() > u8::MAX as usize {
        return None;
    }
    let area = encode_frames(&packet.frames);
    if area.len() > MAX_PACKET_PAYLOAD {
        return None;
    }
    let header = PacketHeader {
        flags: packet.flags,
        session_id: packet.session_id,
        sequence: packet.sequence,
        frame_count: packet.frames.len() as u8,
        payload_len: area.len() as u16,
    };
    let mut out = Vec::with_capacity(PACKET_HEADER_SIZE + area.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&area);
    Some(out)
}

/// Parse an unsealed packet.
pub fn decode_packet(buf: &[u8]) -> Option<Packet> {
    let (header, area) = parse_packet(buf)?;
    let frames = decode_frames(area, header.frame_count)?;
    Some(Packet {
        flags: header.flags,
        session_id: header.session_id,
        sequence: header.sequence,
        frames,
    })
}
