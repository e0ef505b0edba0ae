//! Encrypted datagram transport: wire codecs, reliability primitives, and
//! the per-peer session that composes them.

pub mod ack;
pub mod fragment;
pub mod frame;
pub mod idle;
pub mod packet;
pub mod reorder;
pub mod replay_window;
pub mod retransmit;
pub mod session;
pub mod stats;

pub use ack::{AckBitmap, AckScheduler, AckSchedulerConfig, AckSchedulerStats, seq_less_than};
pub use fragment::{Fragment, FragmentReassembly};
pub use frame::{
    AckFrame, ControlFrame, DataFrame, FragmentHeader, HeartbeatFrame, MuxFrame, decode_frames,
    encode_frames,
};
pub use idle::{ActivityKind, IdleEvent, IdleLevel, IdleTimeout, IdleTimeoutConfig};
pub use packet::{Packet, PacketHeader, decode_packet, encode_packet, parse_packet};
pub use reorder::ReorderBuffer;
pub use replay_window::ReplayWindow;
pub use retransmit::{
    DropPolicy, RetransmitBuffer, RetransmitConfig, RetransmitEntry, RetransmitState,
    RetransmitStats,
};
pub use session::{TransportConfig, TransportSession, TransportStats};
pub use stats::{WireMetrics, WireMetricsCollector};
