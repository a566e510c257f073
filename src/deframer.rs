//! Receive-side byte-stream deframing state machine.
//!
//! The USB bulk link delivers bytes in arbitrary chunks: a frame may arrive
//! split across several reads, or glued to its neighbours, or preceded by
//! garbage after a link glitch.  [`Deframer`] reassembles that stream into
//! whole [`Frame`]s using a two-state machine:
//!
//! ```text
//!          header valid, length known
//!   SYNC ───────────────────────────────▶ PLOAD_CRC
//!    ▲ │ discard one byte                    │ payload+CRC complete:
//!    └─┘ on noise                            │ emit Frame / CrcError
//!    ▲                                       │
//!    └───────────────────────────────────────┘
//! ```
//!
//! - **SYNC** scans for a plausible header: a known [`kind`] value and a
//!   payload length within [`MAX_PSIZE`].  Anything else is dropped one
//!   byte at a time until the stream realigns.
//! - **PLOAD_CRC** accumulates exactly the announced payload + CRC bytes,
//!   then verifies the CRC.  A bad CRC yields [`RxEvent::CrcError`] and the
//!   machine returns to SYNC — one corrupted frame never stalls the stream.
//!
//! This module only manages state; reading the channel is the caller's
//! responsibility (same pattern as [`crate::window`]).

use std::collections::VecDeque;

use crate::frame::{kind, Frame, FrameError, CRC_SIZE, MAX_PSIZE, WOUF_HDR_SIZE};

/// Receive-machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    /// Hunting for a plausible frame header.
    Sync,
    /// Header accepted; collecting `expected` total frame bytes.
    PloadCrc { expected: usize },
}

/// Outcome of one deframing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxEvent {
    /// A whole frame arrived and its CRC verified.
    Frame(Frame),
    /// A candidate frame failed CRC verification and was discarded.
    CrcError,
}

/// Incremental frame reassembler for one receive direction.
#[derive(Debug)]
pub struct Deframer {
    buf: VecDeque<u8>,
    state: RxState,
}

impl Default for Deframer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deframer {
    pub fn new() -> Self {
        Self {
            buf: VecDeque::new(),
            state: RxState::Sync,
        }
    }

    /// Append a raw chunk from the channel.  Chunk boundaries are arbitrary.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend(chunk.iter().copied());
    }

    /// Number of buffered bytes not yet consumed by a decoded frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Discard all buffered bytes and return to SYNC (link reset).
    pub fn clear(&mut self) {
        self.buf.clear();
        self.state = RxState::Sync;
    }

    /// Advance the state machine; returns the next event, or `None` when
    /// more bytes are needed.  Call in a loop until it yields `None`.
    pub fn next_event(&mut self) -> Option<RxEvent> {
        loop {
            match self.state {
                RxState::Sync => {
                    if self.buf.len() < WOUF_HDR_SIZE {
                        return None;
                    }
                    let k = self.buf[1];
                    let pload_len =
                        u16::from_be_bytes([self.buf[2], self.buf[3]]) as usize;
                    if kind::is_valid(k) && pload_len <= MAX_PSIZE {
                        self.state = RxState::PloadCrc {
                            expected: WOUF_HDR_SIZE + pload_len + CRC_SIZE,
                        };
                    } else {
                        // Not a header; shift by one byte and keep hunting.
                        self.buf.pop_front();
                    }
                }
                RxState::PloadCrc { expected } => {
                    if self.buf.len() < expected {
                        return None;
                    }
                    let candidate: Vec<u8> = self.buf.drain(..expected).collect();
                    self.state = RxState::Sync;
                    match Frame::decode(&candidate) {
                        Ok(frame) => return Some(RxEvent::Frame(frame)),
                        Err(FrameError::CrcMismatch) => return Some(RxEvent::CrcError),
                        // Length/size errors cannot happen here: SYNC already
                        // validated the header against the buffered length.
                        Err(_) => return Some(RxEvent::CrcError),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::kind;

    fn drain(d: &mut Deframer) -> Vec<RxEvent> {
        let mut out = Vec::new();
        while let Some(ev) = d.next_event() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn whole_frame_in_one_chunk() {
        let mut d = Deframer::new();
        d.extend(&Frame::new(1, kind::ACK, vec![]).encode());
        let evs = drain(&mut d);
        assert_eq!(evs.len(), 1);
        assert!(matches!(&evs[0], RxEvent::Frame(f) if f.header.tid == 1));
        assert_eq!(d.pending_len(), 0);
    }

    #[test]
    fn frame_split_across_many_reads() {
        let mut d = Deframer::new();
        let bytes = Frame::new(9, kind::DATA, b"abcdef".to_vec()).encode();
        for b in &bytes {
            assert!(d.next_event().is_none());
            d.extend(std::slice::from_ref(b));
        }
        let evs = drain(&mut d);
        assert_eq!(evs.len(), 1);
        assert!(matches!(&evs[0], RxEvent::Frame(f) if f.payload == b"abcdef"));
    }

    #[test]
    fn two_frames_glued_together() {
        let mut d = Deframer::new();
        let mut bytes = Frame::new(1, kind::CMD, b"one".to_vec()).encode();
        bytes.extend(Frame::new(2, kind::CMD, b"two".to_vec()).encode());
        d.extend(&bytes);
        let evs = drain(&mut d);
        assert_eq!(evs.len(), 2);
        assert!(matches!(&evs[1], RxEvent::Frame(f) if f.header.tid == 2));
    }

    #[test]
    fn garbage_prefix_is_skipped() {
        let mut d = Deframer::new();
        // 0x00 is not a valid kind, so these four bytes cannot sync.
        d.extend(&[0x00, 0x00, 0x00, 0x00, 0x00]);
        d.extend(&Frame::new(5, kind::MBOX, b"hi".to_vec()).encode());
        let evs = drain(&mut d);
        assert_eq!(evs.len(), 1);
        assert!(matches!(&evs[0], RxEvent::Frame(f) if f.header.tid == 5));
    }

    #[test]
    fn corrupted_frame_yields_crc_error_then_recovers() {
        let mut d = Deframer::new();
        let mut bad = Frame::new(1, kind::DATA, b"xxxx".to_vec()).encode();
        // Corrupt a payload byte; header stays plausible so the machine
        // commits to PLOAD_CRC and must recover via the CRC check.
        bad[WOUF_HDR_SIZE] ^= 0xFF;
        d.extend(&bad);
        d.extend(&Frame::new(2, kind::DATA, b"good".to_vec()).encode());

        let evs = drain(&mut d);
        assert_eq!(evs.len(), 2);
        assert_eq!(evs[0], RxEvent::CrcError);
        assert!(matches!(&evs[1], RxEvent::Frame(f) if f.payload == b"good"));
    }

    #[test]
    fn one_bad_frame_among_many_valid_ones() {
        let mut d = Deframer::new();
        let n = 5;
        for tid in 0..n {
            d.extend(&Frame::new(tid, kind::CMD, vec![tid; 8]).encode());
        }
        let mut corrupt = Frame::new(0xAA, kind::CMD, vec![0; 8]).encode();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0x55;
        d.extend(&corrupt);
        for tid in n..2 * n {
            d.extend(&Frame::new(tid, kind::CMD, vec![tid; 8]).encode());
        }

        let evs = drain(&mut d);
        let crc_errors = evs.iter().filter(|e| **e == RxEvent::CrcError).count();
        let frames = evs.iter().filter(|e| matches!(e, RxEvent::Frame(_))).count();
        assert_eq!(crc_errors, 1);
        assert_eq!(frames, 2 * n as usize);
    }

    #[test]
    fn oversized_length_field_treated_as_noise() {
        let mut d = Deframer::new();
        // Valid kind but absurd length: must not lock the machine up.
        d.extend(&[0x01, kind::CMD, 0xFF, 0xFF]);
        d.extend(&Frame::new(3, kind::ACK, vec![]).encode());
        let evs = drain(&mut d);
        assert_eq!(evs.len(), 1);
        assert!(matches!(&evs[0], RxEvent::Frame(f) if f.header.tid == 3));
    }

    #[test]
    fn clear_resets_mid_frame() {
        let mut d = Deframer::new();
        let bytes = Frame::new(1, kind::CMD, vec![0; 16]).encode();
        d.extend(&bytes[..8]);
        assert!(d.next_event().is_none());
        d.clear();
        assert_eq!(d.pending_len(), 0);
        d.extend(&Frame::new(2, kind::ACK, vec![]).encode());
        assert!(matches!(d.next_event(), Some(RxEvent::Frame(_))));
    }
}
