//! Inner frame types and the mux codec.
//!
//! A packet's sealed frame area holds one or more frames. Each frame starts
//! with a kind byte followed by a kind-specific body whose length is either
//! fixed (ACK) or embedded in the body header. The parser is strict: unknown
//! kinds, overruns, a frame count that disagrees with the bytes, and
//! trailing garbage all fail the whole area.
//!
//! All integers are big-endian.

use crate::core::{
    ACK_FRAME_SIZE, CONTROL_FRAME_HEADER_SIZE, DATA_FLAG_FIN, DATA_FLAG_FRAGMENT,
    DATA_FRAME_HEADER_SIZE, FRAGMENT_FLAG_LAST, FRAGMENT_HEADER_SIZE, FRAME_KIND_ACK,
    FRAME_KIND_CONTROL, FRAME_KIND_DATA, FRAME_KIND_HEARTBEAT, HEARTBEAT_FRAME_HEADER_SIZE,
};

/// Fragment tagging carried inside a DATA frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Groups the fragments of one application message.
    pub message_id: u64,
    /// Byte offset of this fragment within the message.
    pub offset: u32,
    /// Whether this is the message's final fragment.
    pub last: bool,
}

/// Application data on one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    /// Stream the data belongs to.
    pub stream_id: u64,
    /// Per-stream delivery sequence.
    pub sequence: u64,
    /// Stream-end marker.
    pub fin: bool,
    /// Present when the payload is one fragment of a larger message.
    pub fragment: Option<FragmentHeader>,
    /// Application bytes (fragment bytes when `fragment` is set).
    pub payload: Vec<u8>,
}

/// Selective acknowledgment for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFrame {
    /// Stream being acknowledged.
    pub stream_id: u64,
    /// Highest sequence received on the stream.
    pub highest_ack: u64,
    /// Receipt bits for the 32 sequences below `highest_ack`.
    pub bitmap: u32,
}

/// Control-plane frame; type 0 is padding, other types are reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    /// Control type discriminator.
    pub control_type: u8,
    /// Type-specific payload.
    pub payload: Vec<u8>,
}

/// Keep-alive and cover-traffic frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatFrame {
    /// Milliseconds relative to session start.
    pub timestamp: u64,
    /// Heartbeat sequence number.
    pub sequence: u64,
    /// Mimic payload from the obfuscation profile.
    pub payload: Vec<u8>,
}

/// One frame inside a packet's sealed area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxFrame {
    /// Application data.
    Data(DataFrame),
    /// Selective acknowledgment.
    Ack(AckFrame),
    /// Control plane.
    Control(ControlFrame),
    /// Keep-alive / cover traffic.
    Heartbeat(HeartbeatFrame),
}

impl MuxFrame {
    /// Encoded size in bytes.
    pub fn encoded_size(&self) -> usize {
        match self {
            MuxFrame::Data(data) => {
                let frag = if data.fragment.is_some() { FRAGMENT_HEADER_SIZE } else { 0 };
                DATA_FRAME_HEADER_SIZE + frag + data.payload.len()
            }
            MuxFrame::Ack(_) => ACK_FRAME_SIZE,
            MuxFrame::Control(control) => CONTROL_FRAME_HEADER_SIZE + control.payload.len(),
            MuxFrame::Heartbeat(hb) => HEARTBEAT_FRAME_HEADER_SIZE + hb.payload.len(),
        }
    }
}

/// Append one frame's encoding to `out`.
pub fn encode_frame(frame: &MuxFrame, out: &mut Vec<u8>) {
    match frame {
        MuxFrame::Data(data) => {
            out.push(FRAME_KIND_DATA);
            out.extend_from_slice(&data.stream_id.to_be_bytes());
            out.extend_from_slice(&data.sequence.to_be_bytes());
            let mut flags = 0u8;
            if data.fin {
                flags |= DATA_FLAG_FIN;
            }
            if data.fragment.is_some() {
                flags |= DATA_FLAG_FRAGMENT;
            }
            out.push(flags);
            let frag_len = if data.fragment.is_some() { FRAGMENT_HEADER_SIZE } else { 0 };
            let payload_len = frag_len + data.payload.len();
            debug_assert!(payload_len <= u16::MAX as usize, "DATA payload exceeds frame format");
            out.extend_from_slice(&(payload_len as u16).to_be_bytes());
            if let Some(frag) = &data.fragment {
                out.extend_from_slice(&frag.message_id.to_be_bytes());
                out.extend_from_slice(&frag.offset.to_be_bytes());
                out.push(if frag.last { FRAGMENT_FLAG_LAST } else { 0 });
            }
            out.extend_from_slice(&data.payload);
        }
        MuxFrame::Ack(ack) => {
            out.push(FRAME_KIND_ACK);
            out.extend_from_slice(&ack.stream_id.to_be_bytes());
            out.extend_from_slice(&ack.highest_ack.to_be_bytes());
            out.extend_from_slice(&ack.bitmap.to_be_bytes());
        }
        MuxFrame::Control(control) => {
            out.push(FRAME_KIND_CONTROL);
            out.push(control.control_type);
            debug_assert!(control.payload.len() <= u16::MAX as usize);
            out.extend_from_slice(&(control.payload.len() as u16).to_be_bytes());
            out.extend_from_slice(&control.payload);
        }
        MuxFrame::Heartbeat(hb) => {
            out.push(FRAME_KIND_HEARTBEAT);
            out.extend_from_slice(&hb.timestamp.to_be_bytes());
            out.extend_from_slice(&hb.sequence.to_be_bytes());
            debug_assert!(hb.payload.len() <= u16::MAX as usize);
            out.extend_from_slice(&(hb.payload.len() as u16).to_be_bytes());
            out.extend_from_slice(&hb.payload);
        }
    }
}

/// Encode a whole frame area.
pub fn encode_frames(frames: &[MuxFrame]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frames.iter().map(MuxFrame::encoded_size).sum());
    for frame in frames {
        encode_frame(frame, &mut out);
    }
    out
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes(buf[at..at + 4].try_into().expect("fixed slice"))
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    u64::from_be_bytes(buf[at..at + 8].try_into().expect("fixed slice"))
}

// Decode one frame starting at `at`; returns the frame and the next offset.
fn decode_frame(buf: &[u8], at: usize) -> Option<(MuxFrame, usize)> {
    let kind = *buf.get(at)?;
    match kind {
        FRAME_KIND_DATA => {
            if buf.len() < at + DATA_FRAME_HEADER_SIZE {
                return None;
            }
            let stream_id = read_u64(buf, at + 1);
            let sequence = read_u64(buf, at + 9);
            let flags = buf[at + 17];
            if flags & !(DATA_FLAG_FIN | DATA_FLAG_FRAGMENT) != 0 {
                return None;
            }
            let payload_len = read_u16(buf, at + 18) as usize;
            let body_start = at + DATA_FRAME_HEADER_SIZE;
            let end = body_start.checked_add(payload_len)?;
            if buf.len() < end {
                return None;
            }
            let fragmented = flags & DATA_FLAG_FRAGMENT != 0;
            let (fragment, data_start) = if fragmented {
                if payload_len < FRAGMENT_HEADER_SIZE {
                    return None;
                }
                let message_id = read_u64(buf, body_start);
                let offset = read_u32(buf, body_start + 8);
                let frag_flags = buf[body_start + 12];
                if frag_flags & !FRAGMENT_FLAG_LAST != 0 {
                    return None;
                }
                (
                    Some(FragmentHeader {
                        message_id,
                        offset,
                        last: frag_flags & FRAGMENT_FLAG_LAST != 0,
                    }),
                    body_start + FRAGMENT_HEADER_SIZE,
                )
            } else {
                (None, body_start)
            };
            let frame = MuxFrame::Data(DataFrame {
                stream_id,
                sequence,
                fin: flags & DATA_FLAG_FIN != 0,
                fragment,
                payload: buf[data_start..end].to_vec(),
            });
            Some((frame, end))
        }
        FRAME_KIND_ACK => {
            if buf.len() < at + ACK_FRAME_SIZE {
                return None;
            }
            let frame = MuxFrame::Ack(AckFrame {
                stream_id: read_u64(buf, at + 1),
                highest_ack: read_u64(buf, at + 9),
                bitmap: read_u32(buf, at + 17),
            });
            Some((frame, at + ACK_FRAME_SIZE))
        }
        FRAME_KIND_CONTROL => {
            if buf.len() < at + CONTROL_FRAME_HEADER_SIZE {
                return None;
            }
            let control_type = buf[at + 1];
            let payload_len = read_u16(buf, at + 2) as usize;
            let end = (at + CONTROL_FRAME_HEADER_SIZE).checked_add(payload_len)?;
            if buf.len() < end {
                return None;
            }
            let frame = MuxFrame::Control(ControlFrame {
                control_type,
                payload: buf[at + CONTROL_FRAME_HEADER_SIZE..end].to_vec(),
            });
            Some((frame, end))
        }
        FRAME_KIND_HEARTBEAT => {
            if buf.len() < at + HEARTBEAT_FRAME_HEADER_SIZE {
                return None;
            }
            let timestamp = read_u64(buf, at + 1);
            let sequence = read_u64(buf, at + 9);
            let payload_len = read_u16(buf, at + 17) as usize;
            let end = (at + HEARTBEAT_FRAME_HEADER_SIZE).checked_add(payload_len)?;
            if buf.len() < end {
                return None;
            }
            let frame = MuxFrame::Heartbeat(HeartbeatFrame {
                timestamp,
                sequence,
                payload: buf[at + HEARTBEAT_FRAME_HEADER_SIZE..end].to_vec(),
            });
            Some((frame, end))
        }
        _ => None,
    }
}

/// Decode exactly `count` frames covering the whole buffer.
///
/// `None` on unknown kinds, overruns, short areas, or trailing bytes.
pub fn decode_frames(buf: &[u8], count: u8) -> Option<Vec<MuxFrame>> {
    let mut frames = Vec::with_capacity(count as usize);
    let mut at = 0;
    for _ in 0..count {
        let (frame, next) = decode_frame(buf, at)?;
        frames.push(frame);
        at = next;
    }
    (at == buf.len()).then_some(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(frame: MuxFrame) {
        let encoded = encode_frames(std::slice::from_ref(&frame));
        assert_eq!(encoded.len(), frame.encoded_size());
        let decoded = decode_frames(&encoded, 1).expect("well-formed frame decodes");
        assert_eq!(decoded, vec![frame]);
    }

    #[test]
    fn data_frame_round_trip() {
        round_trip(MuxFrame::Data(DataFrame {
            stream_id: 3,
            sequence: 99,
            fin: true,
            fragment: None,
            payload: b"hello veil".to_vec(),
        }));
    }

    #[test]
    fn fragmented_data_frame_round_trip() {
        round_trip(MuxFrame::Data(DataFrame {
            stream_id: 1,
            sequence: 5,
            fin: false,
            fragment: Some(FragmentHeader { message_id: 77, offset: 1350, last: true }),
            payload: vec![0xEE; 64],
        }));
    }

    #[test]
    fn ack_frame_round_trip() {
        round_trip(MuxFrame::Ack(AckFrame {
            stream_id: 0,
            highest_ack: u64::MAX,
            bitmap: 0xDEAD_BEEF,
        }));
    }

    #[test]
    fn control_frame_round_trip() {
        round_trip(MuxFrame::Control(ControlFrame { control_type: 1, payload: vec![0; 8] }));
    }

    #[test]
    fn heartbeat_frame_round_trip() {
        round_trip(MuxFrame::Heartbeat(HeartbeatFrame {
            timestamp: 123_456,
            sequence: 42,
            payload: vec![0xAB; 20],
        }));
    }

    #[test]
    fn multiple_frames_round_trip() {
        let frames = vec![
            MuxFrame::Data(DataFrame {
                stream_id: 1,
                sequence: 1,
                fin: false,
                fragment: None,
                payload: vec![1, 2, 3],
            }),
            MuxFrame::Ack(AckFrame { stream_id: 1, highest_ack: 10, bitmap: 0b101 }),
            MuxFrame::Control(ControlFrame { control_type: 0, payload: vec![0xFF; 32] }),
        ];
        let encoded = encode_frames(&frames);
        assert_eq!(decode_frames(&encoded, 3).expect("decodes"), frames);
    }

    #[test]
    fn unknown_kind_is_refused() {
        let mut encoded = encode_frames(&[MuxFrame::Ack(AckFrame {
            stream_id: 0,
            highest_ack: 0,
            bitmap: 0,
        })]);
        encoded[0] = 9;
        assert!(decode_frames(&encoded, 1).is_none());
    }

    #[test]
    fn frame_count_overrunning_payload_is_refused() {
        let encoded = encode_frames(&[MuxFrame::Ack(AckFrame {
            stream_id: 0,
            highest_ack: 0,
            bitmap: 0,
        })]);
        assert!(decode_frames(&encoded, 2).is_none());
    }

    #[test]
    fn trailing_bytes_are_refused() {
        let mut encoded = encode_frames(&[MuxFrame::Ack(AckFrame {
            stream_id: 0,
            highest_ack: 0,
            bitmap: 0,
        })]);
        encoded.push(0x00);
        assert!(decode_frames(&encoded, 1).is_none());
    }

    #[test]
    fn truncated_data_frame_is_refused() {
        let encoded = encode_frames(&[MuxFrame::Data(DataFrame {
            stream_id: 1,
            sequence: 1,
            fin: false,
            fragment: None,
            payload: vec![7; 16],
        })]);
        assert!(decode_frames(&encoded[..encoded.len() - 1], 1).is_none());
    }

    #[test]
    fn reserved_data_flags_are_refused() {
        let mut encoded = encode_frames(&[MuxFrame::Data(DataFrame {
            stream_id: 1,
            sequence: 1,
            fin: false,
            fragment: None,
            payload: vec![],
        })]);
        encoded[17] = 0x80;
        assert!(decode_frames(&encoded, 1).is_none());
    }

    #[test]
    fn fragment_shorter_than_subheader_is_refused() {
        let mut encoded = Vec::new();
        encoded.push(FRAME_KIND_DATA);
        encoded.extend_from_slice(&1u64.to_be_bytes());
        encoded.extend_from_slice(&1u64.to_be_bytes());
        encoded.push(DATA_FLAG_FRAGMENT);
        encoded.extend_from_slice(&4u16.to_be_bytes());
        encoded.extend_from_slice(&[0u8; 4]);
        assert!(decode_frames(&encoded, 1).is_none());
    }
}
