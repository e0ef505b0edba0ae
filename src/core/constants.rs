//! Protocol constants fixed by the VEIL wire format.
//!
//! These values are part of the protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// CRYPTOGRAPHIC CONSTANTS
// =============================================================================

/// Poly1305 authentication tag size.
pub const AEAD_TAG_SIZE: usize = 16;

/// ChaCha20-Poly1305 nonce size.
pub const AEAD_NONCE_SIZE: usize = 12;

/// ChaCha20-Poly1305 key size.
pub const AEAD_KEY_SIZE: usize = 32;

/// X25519 public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// X25519 private key size.
pub const PRIVATE_KEY_SIZE: usize = 32;

/// X25519 shared secret size.
pub const SHARED_SECRET_SIZE: usize = 32;

/// SHA-256 / HMAC-SHA256 output size.
pub const HASH_SIZE: usize = 32;

/// Handshake salt size.
pub const SALT_SIZE: usize = 16;

/// Obfuscation profile seed size.
pub const PROFILE_SEED_SIZE: usize = 32;

/// Protocol version byte carried in every packet and handshake message.
pub const PROTOCOL_VERSION: u8 = 1;

/// Two-byte magic at the start of every post-prefix packet.
pub const PACKET_MAGIC: [u8; 2] = [0x56, 0x4C];

// =============================================================================
// PACKET LAYOUT
// =============================================================================

/// Outer packet header size: magic(2) + version(1) + flags(1) +
/// session_id(8) + sequence(8) + frame_count(1) + payload_len(2).
pub const PACKET_HEADER_SIZE: usize = 23;

/// Hard cap on the sealed frame area of one packet.
pub const MAX_PACKET_PAYLOAD: usize = 65535 - PACKET_HEADER_SIZE;

/// DATA frame fixed header: kind(1) + stream_id(8) + sequence(8) + flags(1) + len(2).
pub const DATA_FRAME_HEADER_SIZE: usize = 20;

/// ACK frame size: kind(1) + stream_id(8) + highest_ack(8) + bitmap(4).
pub const ACK_FRAME_SIZE: usize = 21;

/// CONTROL frame fixed header: kind(1) + type(1) + len(2).
pub const CONTROL_FRAME_HEADER_SIZE: usize = 4;

/// HEARTBEAT frame fixed header: kind(1) + timestamp(8) + sequence(8) + len(2).
pub const HEARTBEAT_FRAME_HEADER_SIZE: usize = 19;

/// Fragment subheader inside a DATA payload: message_id(8) + offset(4) + flags(1).
pub const FRAGMENT_HEADER_SIZE: usize = 13;

// =============================================================================
// FRAME KINDS AND FLAGS
// =============================================================================

/// DATA frame kind byte.
pub const FRAME_KIND_DATA: u8 = 1;

/// ACK frame kind byte.
pub const FRAME_KIND_ACK: u8 = 2;

/// CONTROL frame kind byte.
pub const FRAME_KIND_CONTROL: u8 = 3;

/// HEARTBEAT frame kind byte.
pub const FRAME_KIND_HEARTBEAT: u8 = 4;

/// DATA flag: final frame of its stream.
pub const DATA_FLAG_FIN: u8 = 0x01;

/// DATA flag: payload carries a fragment subheader.
pub const DATA_FLAG_FRAGMENT: u8 = 0x02;

/// Fragment flag: last fragment of its message.
pub const FRAGMENT_FLAG_LAST: u8 = 0x01;

/// CONTROL type: deterministic padding filler, discarded by the receiver.
pub const CONTROL_TYPE_PADDING: u8 = 0;

/// CONTROL type: cumulative acknowledgment point (8-byte sequence).
pub const CONTROL_TYPE_CUMULATIVE_ACK: u8 = 1;

// =============================================================================
// HANDSHAKE
// =============================================================================

/// INIT plaintext body: version(1) + pubkey(32) + timestamp(8) + mac(32).
pub const INIT_BODY_SIZE: usize = 73;

/// INIT wire size: salt(16) + sealed body.
pub const INIT_WIRE_SIZE: usize = SALT_SIZE + INIT_BODY_SIZE + AEAD_TAG_SIZE;

/// Sealed key-confirmation blob inside RESPONSE.
pub const CONFIRMATION_SIZE: usize = 12 + AEAD_TAG_SIZE;

/// RESPONSE plaintext body: pubkey(32) + session_id(8) + timestamp(8) +
/// mac(32) + confirmation(28).
pub const RESPONSE_BODY_SIZE: usize = 80 + CONFIRMATION_SIZE;

/// RESPONSE wire size: sealed body.
pub const RESPONSE_WIRE_SIZE: usize = RESPONSE_BODY_SIZE + AEAD_TAG_SIZE;

/// Default tolerance for handshake timestamp skew.
pub const DEFAULT_SKEW_TOLERANCE: Duration = Duration::from_millis(200);

/// Default handshake replay cache capacity.
pub const REPLAY_CACHE_CAPACITY: usize = 4096;

/// Default handshake replay cache time window.
pub const REPLAY_CACHE_WINDOW: Duration = Duration::from_secs(60);

// =============================================================================
// TRANSPORT TIMING
// =============================================================================

/// Initial retransmission timeout before the first RTT sample.
pub const INITIAL_RTO: Duration = Duration::from_millis(1000);

/// Minimum retransmission timeout.
pub const MIN_RTO: Duration = Duration::from_millis(100);

/// Maximum retransmission timeout.
pub const MAX_RTO: Duration = Duration::from_millis(60000);

/// Maximum retransmission attempts before a packet is dropped.
pub const MAX_RETRIES: u32 = 10;

/// Received packets that force an immediate ACK.
pub const ACK_EVERY_N_PACKETS: u32 = 2;

/// Longest an ACK may be delayed for coalescing.
pub const MAX_ACK_DELAY: Duration = Duration::from_millis(25);

/// Default session-id rotation interval.
pub const SESSION_ROTATION_INTERVAL: Duration = Duration::from_secs(30);

/// Default sent-packet count that forces session-id rotation.
pub const SESSION_ROTATION_PACKETS: u64 = 1_000_000;

/// Default replay window size in bits.
pub const REPLAY_WINDOW_BITS: usize = 1024;

/// Default fragment reassembly timeout.
pub const FRAGMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum transmission unit for outgoing datagrams.
pub const DEFAULT_MTU: usize = 1400;

/// Default maximum fragment payload size.
pub const DEFAULT_MAX_FRAGMENT_SIZE: usize = 1350;
