//! Go-Back-N send-side window and circular frame store.
//!
//! [`Window`] owns the ARQ bookkeeping for one channel: sequence-number
//! assignment, frame retention for retransmission, and cumulative-ACK
//! processing.  Up to [`NR_OF_WIN`] frames may be unacknowledged at once.
//!
//! # Protocol contract
//!
//! - Sequence numbers (`tid`) are mod-256; wrap-around comparisons use
//!   unsigned distance from the window base, never raw `<`.
//! - ACKs are **cumulative**: `Rn = K` means the device has accepted every
//!   frame with tid before `K`, which slides the base `Sb` to `K` in one
//!   step and frees the covered store slots.
//! - On timeout, CRC error, or an out-of-order ACK the caller rewinds the
//!   send cursor to `Sb` and retransmits every retained frame through `Sm`
//!   in original order, byte-identical (the "go back N" step).  One lost
//!   frame costs the whole unacknowledged window; in exchange the receiver
//!   needs only a single counter of state.
//!
//! # Sequence-number layout
//!
//! ```text
//!      Sb            Sn            Sm
//!       │             │             │
//!  ─────┼─────────────┼─────────────┼─────▶ tid space (mod 256)
//!       │◀ awaiting ─▶│◀ submitted ▶│
//!       │    ACK      │  not sent   │
//! ```
//!
//! `Sn` normally trails `Sm` only between `submit` and the transmit pump;
//! Go-Back-N recovery rewinds `Sn` to `Sb`, re-opening the whole window for
//! transmission.
//!
//! This module only manages state; all channel I/O and retry policy live in
//! [`crate::session`].

use crate::batch::ReadSpan;
use crate::frame::{kind, Frame};

/// Maximum number of unacknowledged frames (window size N).
pub const NR_OF_WIN: u8 = 64;

/// Circular frame-store capacity, indexed by `tid % NR_OF_CLK`.
///
/// 255 slots for 256 tids means tids exactly 255 apart share a slot; with a
/// 64-frame window they can never be retained simultaneously.
pub const NR_OF_CLK: usize = 255;

/// Unsigned mod-256 distance from `from` to `to`.
#[inline]
fn seq_dist(from: u8, to: u8) -> u8 {
    to.wrapping_sub(from)
}

// ---------------------------------------------------------------------------
// Frame store
// ---------------------------------------------------------------------------

/// One retained outbound frame occupying a store slot.
#[derive(Debug, Clone)]
pub struct StoredFrame {
    /// Encoded frame bytes.  Immutable once stored — retransmission resends
    /// exactly these bytes.
    pub bytes: Vec<u8>,
    /// Shadow destinations for the READ records in this frame, in record
    /// order.  Consulted when the matching data frame arrives.
    pub reads: Vec<ReadSpan>,
    /// Total number of times this frame has been transmitted.
    pub tx_count: u32,
}

/// Fixed-capacity circular array of optional frame slots.
///
/// A slot is occupied while its frame awaits acknowledgment and is only
/// overwritten after release.
#[derive(Debug)]
struct FrameStore {
    slots: Vec<Option<StoredFrame>>,
}

impl FrameStore {
    fn new() -> Self {
        Self {
            slots: (0..NR_OF_CLK).map(|_| None).collect(),
        }
    }

    #[inline]
    fn idx(tid: u8) -> usize {
        tid as usize % NR_OF_CLK
    }

    fn occupy(&mut self, tid: u8, frame: StoredFrame) {
        let slot = &mut self.slots[Self::idx(tid)];
        debug_assert!(slot.is_none(), "frame store slot {tid} still occupied");
        *slot = Some(frame);
    }

    fn release(&mut self, tid: u8) {
        self.slots[Self::idx(tid)] = None;
    }

    fn get(&self, tid: u8) -> Option<&StoredFrame> {
        self.slots[Self::idx(tid)].as_ref()
    }

    fn get_mut(&mut self, tid: u8) -> Option<&mut StoredFrame> {
        self.slots[Self::idx(tid)].as_mut()
    }

    fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Outcome of processing a cumulative acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// `Sb` advanced by this many frames; their slots were released.
    Advanced(u8),
    /// `Rn == Sb`: the device is still waiting for the window base.  With
    /// frames in flight this is the Go-Back-N loss signal.
    Duplicate,
    /// `Rn` lies beyond `Sm` — the device acknowledged a frame we never
    /// sent.  Window state is left untouched.
    OutOfOrder,
}

/// Go-Back-N window state for one channel.
#[derive(Debug)]
pub struct Window {
    /// Sequence base: oldest unacknowledged tid (left window edge).
    sb: u8,
    /// Send cursor: next tid to (re)transmit.
    sn: u8,
    /// Sequence max: next tid to assign to a submitted frame.
    sm: u8,
    /// Last request number received from the device.
    rn: u8,
    store: FrameStore,
}

impl Default for Window {
    fn default() -> Self {
        Self::new()
    }
}

impl Window {
    pub fn new() -> Self {
        Self {
            sb: 0,
            sn: 0,
            sm: 0,
            rn: 0,
            store: FrameStore::new(),
        }
    }

    pub fn sb(&self) -> u8 {
        self.sb
    }

    pub fn sm(&self) -> u8 {
        self.sm
    }

    pub fn rn(&self) -> u8 {
        self.rn
    }

    /// Number of frames submitted but not yet acknowledged.
    pub fn in_flight(&self) -> u8 {
        seq_dist(self.sb, self.sm)
    }

    /// `true` when there is room for one more in-flight frame.
    pub fn can_submit(&self) -> bool {
        self.in_flight() < NR_OF_WIN
    }

    /// `true` when at least one frame awaits acknowledgment.
    pub fn has_unacked(&self) -> bool {
        self.sb != self.sm
    }

    /// `true` when `tid`'s store slot is still occupied.
    pub fn is_retained(&self, tid: u8) -> bool {
        self.store.get(tid).is_some()
    }

    /// Claim the next tid for `payload`, encode the frame, and retain it.
    ///
    /// Returns the assigned tid.  Check [`can_submit`](Self::can_submit)
    /// first; the caller surfaces `WindowFull` as a retryable error.
    ///
    /// # Panics
    ///
    /// Panics in debug mode when the window is already full.
    pub fn submit(&mut self, payload: Vec<u8>, reads: Vec<ReadSpan>) -> u8 {
        debug_assert!(
            self.can_submit(),
            "submit on a full GBN window ({} / {NR_OF_WIN})",
            self.in_flight()
        );
        let tid = self.sm;
        let bytes = Frame::new(tid, kind::CMD, payload).encode();
        self.store.occupy(
            tid,
            StoredFrame {
                bytes,
                reads,
                tx_count: 0,
            },
        );
        self.sm = self.sm.wrapping_add(1);
        tid
    }

    /// Yield the next frame due for transmission and advance the send
    /// cursor.  Each yield bumps the frame's `tx_count`.
    ///
    /// Drives both first transmission (after `submit`) and retransmission
    /// (after [`rewind`](Self::rewind)); the session pumps this until `None`.
    pub fn next_to_send(&mut self) -> Option<(u8, &[u8])> {
        if self.sn == self.sm {
            return None;
        }
        let tid = self.sn;
        self.sn = self.sn.wrapping_add(1);
        let slot = self.store.get_mut(tid)?;
        slot.tx_count += 1;
        Some((tid, slot.bytes.as_slice()))
    }

    /// Step the send cursor back one frame, undoing the matching
    /// [`next_to_send`](Self::next_to_send) after a transmit that did not
    /// happen (channel backpressure).
    pub fn retreat(&mut self) {
        debug_assert!(self.sn != self.sb, "retreat past the window base");
        self.sn = self.sn.wrapping_sub(1);
        if let Some(frame) = self.store.get_mut(self.sn) {
            frame.tx_count -= 1;
        }
    }

    /// Process a cumulative acknowledgment carrying request number `rn`.
    pub fn on_ack(&mut self, rn: u8) -> AckOutcome {
        let newly = seq_dist(self.sb, rn);
        if newly == 0 {
            self.rn = rn;
            return AckOutcome::Duplicate;
        }
        if newly > self.in_flight() {
            return AckOutcome::OutOfOrder;
        }
        let mut tid = self.sb;
        for _ in 0..newly {
            self.store.release(tid);
            tid = tid.wrapping_add(1);
        }
        self.sb = rn;
        self.rn = rn;
        // An ACK for frames the pump has not sent yet means the cursor went
        // stale (only possible mid-recovery); keep it inside the window.
        if seq_dist(self.sb, self.sn) > self.in_flight() {
            self.sn = self.sb;
        }
        AckOutcome::Advanced(newly)
    }

    /// Rewind the send cursor to the window base (Go-Back-N recovery).
    ///
    /// The following [`next_to_send`](Self::next_to_send) pump resends every
    /// retained frame from `Sb` through `Sm` in original order without
    /// reassigning sequence numbers.
    pub fn rewind(&mut self) {
        self.sn = self.sb;
    }

    /// Shadow destinations recorded for `tid`'s READ records.
    pub fn reads_for(&self, tid: u8) -> Option<&[ReadSpan]> {
        self.store.get(tid).map(|f| f.reads.as_slice())
    }

    /// Transmission count for a retained frame (diagnostics and tests).
    pub fn tx_count(&self, tid: u8) -> Option<u32> {
        self.store.get(tid).map(|f| f.tx_count)
    }

    /// Discard all retained frames and restore initial counters (channel
    /// reset; the remote side must be reset in lockstep by bring-up code).
    pub fn reset(&mut self) {
        self.sb = 0;
        self.sn = 0;
        self.sm = 0;
        self.rn = 0;
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    /// Submit one frame with a recognisable payload.
    fn submit_one(w: &mut Window, marker: u8) -> u8 {
        w.submit(vec![marker; 4], vec![])
    }

    /// Pump the transmit cursor to the end, returning (tid, bytes) pairs.
    fn pump(w: &mut Window) -> Vec<(u8, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some((tid, bytes)) = w.next_to_send() {
            out.push((tid, bytes.to_vec()));
        }
        out
    }

    #[test]
    fn initial_state() {
        let w = Window::new();
        assert_eq!(w.in_flight(), 0);
        assert!(w.can_submit());
        assert!(!w.has_unacked());
    }

    #[test]
    fn submit_assigns_sequential_tids() {
        let mut w = Window::new();
        assert_eq!(submit_one(&mut w, 0), 0);
        assert_eq!(submit_one(&mut w, 1), 1);
        assert_eq!(submit_one(&mut w, 2), 2);
        assert_eq!(w.in_flight(), 3);
    }

    #[test]
    fn window_refuses_submission_at_capacity() {
        let mut w = Window::new();
        for i in 0..NR_OF_WIN {
            assert!(w.can_submit());
            submit_one(&mut w, i);
        }
        assert!(!w.can_submit());
        assert_eq!(w.in_flight(), NR_OF_WIN);
        // One ACK re-opens the window.
        assert_eq!(w.on_ack(1), AckOutcome::Advanced(1));
        assert!(w.can_submit());
    }

    #[test]
    fn window_invariant_holds_across_mixed_traffic() {
        let mut w = Window::new();
        let mut next_ack: u8 = 0;
        for round in 0..40u16 {
            for i in 0..5 {
                if w.can_submit() {
                    submit_one(&mut w, i);
                }
            }
            pump(&mut w);
            next_ack = next_ack.wrapping_add((round % 3) as u8);
            w.on_ack(next_ack);
            assert!(w.in_flight() <= NR_OF_WIN);
        }
    }

    #[test]
    fn pump_sends_in_submission_order() {
        let mut w = Window::new();
        for i in 0..4 {
            submit_one(&mut w, i);
        }
        let sent = pump(&mut w);
        let tids: Vec<u8> = sent.iter().map(|(t, _)| *t).collect();
        assert_eq!(tids, vec![0, 1, 2, 3]);
        // Nothing more to send until new submissions or a rewind.
        assert!(w.next_to_send().is_none());
    }

    #[test]
    fn cumulative_ack_slides_base_in_one_step() {
        let mut w = Window::new();
        for i in 0..16 {
            submit_one(&mut w, i);
        }
        pump(&mut w);
        assert_eq!(w.on_ack(10), AckOutcome::Advanced(10));
        assert_eq!(w.sb(), 10);
        assert_eq!(w.in_flight(), 6);
        for tid in 0..10 {
            assert!(!w.is_retained(tid));
        }
        for tid in 10..16 {
            assert!(w.is_retained(tid));
        }
    }

    #[test]
    fn duplicate_ack_reported() {
        let mut w = Window::new();
        submit_one(&mut w, 0);
        pump(&mut w);
        assert_eq!(w.on_ack(1), AckOutcome::Advanced(1));
        assert_eq!(w.on_ack(1), AckOutcome::Duplicate);
    }

    #[test]
    fn ack_beyond_sm_is_out_of_order() {
        let mut w = Window::new();
        submit_one(&mut w, 0);
        pump(&mut w);
        assert_eq!(w.on_ack(40), AckOutcome::OutOfOrder);
        assert_eq!(w.sb(), 0); // unchanged
        assert!(w.is_retained(0));
    }

    #[test]
    fn rewind_retransmits_base_through_sm_in_order() {
        let mut w = Window::new();
        for i in 0..8 {
            submit_one(&mut w, i);
        }
        let first = pump(&mut w);
        // Frames 0..5 delivered; frame 5 lost.
        w.on_ack(5);
        w.rewind();
        let resent = pump(&mut w);
        let tids: Vec<u8> = resent.iter().map(|(t, _)| *t).collect();
        assert_eq!(tids, vec![5, 6, 7]);
        // Byte-identical to the original transmission.
        for (tid, bytes) in &resent {
            let (_, orig) = first.iter().find(|(t, _)| t == tid).unwrap();
            assert_eq!(bytes, orig);
        }
    }

    #[test]
    fn retreat_undoes_one_send_step() {
        let mut w = Window::new();
        submit_one(&mut w, 0);
        submit_one(&mut w, 1);
        let tid = w.next_to_send().map(|(t, _)| t).unwrap();
        assert_eq!(tid, 0);
        // The transmit was refused; put the frame back.
        w.retreat();
        assert_eq!(w.tx_count(0), Some(0));
        let sent = pump(&mut w);
        let tids: Vec<u8> = sent.iter().map(|(t, _)| *t).collect();
        assert_eq!(tids, vec![0, 1]);
    }

    #[test]
    fn tx_count_tracks_retransmissions() {
        let mut w = Window::new();
        submit_one(&mut w, 0);
        pump(&mut w);
        assert_eq!(w.tx_count(0), Some(1));
        w.rewind();
        pump(&mut w);
        assert_eq!(w.tx_count(0), Some(2));
    }

    #[test]
    fn tid_wraps_mod_256() {
        let mut w = Window::new();
        // Drive the window close to the wrap point.
        for _ in 0..250 {
            submit_one(&mut w, 0);
            pump(&mut w);
            let next = w.sm();
            w.on_ack(next);
        }
        assert_eq!(w.sb(), 250);
        for i in 0..10 {
            submit_one(&mut w, i);
        }
        assert_eq!(w.sm(), 4); // 250 + 10 wraps past 255
        assert_eq!(w.in_flight(), 10);
        pump(&mut w);
        assert_eq!(w.on_ack(2), AckOutcome::Advanced(8));
        assert_eq!(w.sb(), 2);
    }

    #[test]
    fn store_slot_reusable_after_wraparound() {
        let mut w = Window::new();
        // tid 255 and tid 0 share store slot 0 (255 % 255 == 0); they are
        // never retained together because the window is far narrower.
        for _ in 0..=255u16 {
            let tid = w.submit(vec![0xEE], vec![]);
            pump(&mut w);
            w.on_ack(tid.wrapping_add(1));
        }
        assert_eq!(w.sb(), 0);
        assert_eq!(w.in_flight(), 0);
    }

    #[test]
    fn encoded_frames_decode_with_matching_tid() {
        let mut w = Window::new();
        submit_one(&mut w, 7);
        let sent = pump(&mut w);
        let f = Frame::decode(&sent[0].1).unwrap();
        assert_eq!(f.header.tid, 0);
        assert_eq!(f.payload, vec![7; 4]);
    }

    #[test]
    fn read_metadata_survives_until_ack() {
        use crate::batch::ReadSpan;
        let mut w = Window::new();
        let tid = w.submit(vec![0x40, 0x10, 4], vec![ReadSpan { addr: 0x10, len: 4 }]);
        pump(&mut w);
        assert_eq!(w.reads_for(tid), Some(&[ReadSpan { addr: 0x10, len: 4 }][..]));
        w.on_ack(tid.wrapping_add(1));
        assert_eq!(w.reads_for(tid), None);
    }

    #[test]
    fn reset_discards_everything() {
        let mut w = Window::new();
        for i in 0..5 {
            submit_one(&mut w, i);
        }
        pump(&mut w);
        w.reset();
        assert_eq!(w.in_flight(), 0);
        assert_eq!(w.sb(), 0);
        for tid in 0..5 {
            assert!(!w.is_retained(tid));
        }
    }
}
