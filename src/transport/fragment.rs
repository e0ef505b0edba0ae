//! Reassembly of application messages split across datagrams.
//!
//! Messages larger than the fragment size travel as multiple DATA frames
//! sharing a message id, each tagged with its byte offset; the final
//! fragment carries a last-marker. Reassembly succeeds once the fragments
//! cover the message contiguously from offset zero through the marked end.
//! Partial messages are swept after a timeout so a lost fragment cannot pin
//! memory forever.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One received fragment.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Byte offset within the message.
    pub offset: u32,
    /// Fragment bytes.
    pub data: Vec<u8>,
    /// Whether this fragment ends the message.
    pub last: bool,
}

#[derive(Debug, Default)]
struct PartialMessage {
    fragments: Vec<Fragment>,
    total_bytes: usize,
    has_last: bool,
    first_seen: Option<Instant>,
}

/// Reassembles fragmented messages keyed by message id.
#[derive(Debug)]
pub struct FragmentReassembly {
    max_bytes: usize,
    timeout: Duration,
    partial: HashMap<u64, PartialMessage>,
}

impl FragmentReassembly {
    /// A reassembler with a per-message byte budget and an expiry timeout.
    pub fn new(max_bytes: usize, timeout: Duration) -> Self {
        Self { max_bytes, timeout, partial: HashMap::new() }
    }

    /// Add a fragment. Returns `false` when the message's byte budget is
    /// exceeded (the fragment is discarded; the partial message remains).
    pub fn push(&mut self, message_id: u64, fragment: Fragment, now: Instant) -> bool {
        let entry = self.partial.entry(message_id).or_default();
        if entry.first_seen.is_none() {
            entry.first_seen = Some(now);
        }
        if entry.total_bytes + fragment.data.len() > self.max_bytes {
            return false;
        }
        entry.total_bytes += fragment.data.len();
        entry.has_last |= fragment.last;
        entry.fragments.push(fragment);
        true
    }

    /// Attempt reassembly: succeeds when the last fragment is present and
    /// the offsets cover the message contiguously from zero. On success the
    /// partial state is consumed.
    pub fn try_reassemble(&mut self, message_id: u64) -> Option<Vec<u8>> {
        let entry = self.partial.get_mut(&message_id)?;
        if !entry.has_last {
            return None;
        }

        entry.fragments.sort_by_key(|fragment| fragment.offset);
        let mut expected_offset = 0usize;
        for fragment in &entry.fragments {
            if fragment.offset as usize != expected_offset {
                return None;
            }
            expected_offset += fragment.data.len();
        }

        let mut output = Vec::with_capacity(expected_offset);
        for fragment in &entry.fragments {
            output.extend_from_slice(&fragment.data);
        }
        self.partial.remove(&message_id);
        Some(output)
    }

    /// Remove partial messages older than the timeout. Returns how many
    /// were dropped.
    pub fn sweep_expired(&mut self, now: Instant) -> usize {
        let timeout = self.timeout;
        let before = self.partial.len();
        self.partial.retain(|_, entry| {
            entry
                .first_seen
                .is_none_or(|seen| now.saturating_duration_since(seen) <= timeout)
        });
        before - self.partial.len()
    }

    /// Bytes held across all partial messages.
    pub fn memory_usage(&self) -> usize {
        self.partial.values().map(|entry| entry.total_bytes).sum()
    }

    /// Number of partially reassembled messages.
    pub fn partial_count(&self) -> usize {
        self.partial.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(offset: u32, data: &[u8], last: bool) -> Fragment {
        Fragment { offset, data: data.to_vec(), last }
    }

    #[test]
    fn reassembles_in_order() {
        let mut reassembly = FragmentReassembly::new(1 << 20, Duration::from_secs(30));
        let now = Instant::now();
        assert!(reassembly.push(1, frag(0, b"hello ", false), now));
        assert!(reassembly.push(1, frag(6, b"veil", true), now));
        assert_eq!(reassembly.try_reassemble(1), Some(b"hello veil".to_vec()));
        assert_eq!(reassembly.partial_count(), 0);
    }

    #[test]
    fn reassembles_out_of_order() {
        let mut reassembly = FragmentReassembly::new(1 << 20, Duration::from_secs(30));
        let now = Instant::now();
        assert!(reassembly.push(7, frag(6, b"veil", true), now));
        assert!(reassembly.push(7, frag(0, b"hello ", false), now));
        assert_eq!(reassembly.try_reassemble(7), Some(b"hello veil".to_vec()));
    }

    #[test]
    fn incomplete_without_last_marker() {
        let mut reassembly = FragmentReassembly::new(1 << 20, Duration::from_secs(30));
        let now = Instant::now();
        reassembly.push(1, frag(0, b"abc", false), now);
        assert_eq!(reassembly.try_reassemble(1), None);
        assert_eq!(reassembly.partial_count(), 1);
    }

    #[test]
    fn incomplete_with_gap() {
        let mut reassembly = FragmentReassembly::new(1 << 20, Duration::from_secs(30));
        let now = Instant::now();
        reassembly.push(1, frag(0, b"abc", false), now);
        reassembly.push(1, frag(6, b"def", true), now);
        assert_eq!(reassembly.try_reassemble(1), None);

        // Filling the gap completes the message.
        reassembly.push(1, frag(3, b"xyz", false), now);
        assert_eq!(reassembly.try_reassemble(1), Some(b"abcxyzdef".to_vec()));
    }

    #[test]
    fn unknown_message_is_none() {
        let mut reassembly = FragmentReassembly::new(1 << 20, Duration::from_secs(30));
        assert_eq!(reassembly.try_reassemble(99), None);
    }

    #[test]
    fn byte_budget_rejects_oversized_messages() {
        let mut reassembly = FragmentReassembly::new(8, Duration::from_secs(30));
        let now = Instant::now();
        assert!(reassembly.push(1, frag(0, b"12345", false), now));
        assert!(!reassembly.push(1, frag(5, b"6789a", true), now));
        assert_eq!(reassembly.memory_usage(), 5);
    }

    #[test]
    fn expired_partials_are_swept() {
        let mut reassembly = FragmentReassembly::new(1 << 20, Duration::from_millis(100));
        let start = Instant::now();
        reassembly.push(1, frag(0, b"old", false), start);
        reassembly.push(2, frag(0, b"new", false), start + Duration::from_millis(90));

        assert_eq!(reassembly.sweep_expired(start + Duration::from_millis(150)), 1);
        assert_eq!(reassembly.partial_count(), 1);
        assert_eq!(reassembly.try_reassemble(1), None);
    }
}
