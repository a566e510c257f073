//! Single-owner WOU session: batching, ARQ, dispatch, realtime path.
//!
//! [`Session`] ties the pure state machines together around one
//! [`Transport`] and exposes the synchronous API the control loop calls:
//!
//! ```text
//!  application
//!      │ queue_command / flush            read_shadow
//!      ▼                                      ▲
//!  ┌─────────┐  pending   ┌─────────┐     ┌───┴────────────┐
//!  │ Batcher │──payload──▶│ Window  │     │ RegisterShadow │
//!  └─────────┘            │ (GBN)   │     └───▲────────────┘
//!      rt_submit          └──┬──────┘         │ scatter
//!      ▼                     │ encoded frames │
//!  ┌─────────┐               ▼                │
//!  │ rt slot │────────▶ Transport ──▶ (FPGA) ─┴─▶ Deframer ─▶ dispatch
//!  └─────────┘                                     │  ├─ ACK  → window
//!                                                  │  ├─ DATA → shadow
//!                                                  │  ├─ BPRU → shadow
//!                                                  │  ├─ MBOX → hooks
//!                                                  │  └─ RT   → hooks
//! ```
//!
//! All mutation happens inside the caller's thread of control: nothing here
//! spawns or blocks.  `poll_receive` must be called regularly (each control
//! tick) to drain inbound bytes, run callbacks, and drive retransmission.
//!
//! Callbacks are invoked synchronously inside `poll_receive`; they must not
//! perform further I/O on this session (re-entrancy is the embedding
//! application's contract to keep).

use std::io;
use std::time::Instant;

use crate::batch::{Batcher, Command};
use crate::deframer::{Deframer, RxEvent};
use crate::error::WouError;
use crate::frame::{kind, Frame, MAX_PSIZE, TID_RT};
use crate::shadow::RegisterShadow;
use crate::timer::{RetransmitTimer, TimerConfig};
use crate::transport::Transport;
use crate::window::{AckOutcome, Window};

// ---------------------------------------------------------------------------
// Event hooks
// ---------------------------------------------------------------------------

/// Application callbacks for asynchronous inbound content, injected at
/// construction.  Default bodies ignore everything, so implementors override
/// only what they consume.
pub trait EventHooks {
    /// An unsolicited mailbox message arrived.
    fn on_mailbox(&mut self, _payload: &[u8]) {}

    /// A frame failed CRC verification; `count` is the running total.
    /// Recovery is automatic — this is a link-health diagnostic.
    fn on_crc_error(&mut self, _count: u32) {}

    /// A realtime command response arrived.
    fn on_rt_result(&mut self, _payload: &[u8]) {}
}

/// Hooks implementation that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHooks;

impl EventHooks for NullHooks {}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One connected board's WOU channel.
pub struct Session<C: Transport, H: EventHooks> {
    channel: C,
    hooks: H,
    window: Window,
    batch: Batcher,
    shadow: RegisterShadow,
    rx: Deframer,
    timer: RetransmitTimer,
    /// Encoded realtime frame awaiting (re)transmission; overwritten by
    /// each `rt_submit`, dropped once sent.
    rt_slot: Option<Vec<u8>>,
    /// Loss signal observed while draining a receive burst; coalesced
    /// into a single recovery once the drain completes.
    pending_recovery: Option<&'static str>,
    crc_errors: u32,
    tx_bytes: u64,
    rx_bytes: u64,
    /// Set by a fatal error; every entry point then returns `LinkDown`
    /// until `reset` is called.
    dead: bool,
}

impl<C: Transport> Session<C, NullHooks> {
    /// Session with default timing and no event consumers.
    pub fn new(channel: C) -> Self {
        Self::with_hooks(channel, NullHooks)
    }
}

impl<C: Transport, H: EventHooks> Session<C, H> {
    pub fn with_hooks(channel: C, hooks: H) -> Self {
        Self::with_config(channel, hooks, TimerConfig::default())
    }

    pub fn with_config(channel: C, hooks: H, config: TimerConfig) -> Self {
        Self {
            channel,
            hooks,
            window: Window::new(),
            batch: Batcher::new(),
            shadow: RegisterShadow::new(),
            rx: Deframer::new(),
            timer: RetransmitTimer::new(config),
            rt_slot: None,
            pending_recovery: None,
            crc_errors: 0,
            tx_bytes: 0,
            rx_bytes: 0,
            dead: false,
        }
    }

    // -----------------------------------------------------------------------
    // Bulk command path
    // -----------------------------------------------------------------------

    /// Append one register access to the pending outbound frame.
    ///
    /// When the record would overflow the frame payload limit the pending
    /// frame is flushed first; that flush can surface `WindowFull`, in
    /// which case nothing is queued and the caller retries after draining a
    /// receive cycle.
    pub fn queue_command(&mut self, cmd: &Command<'_>) -> Result<(), WouError> {
        self.ensure_alive()?;
        cmd.validate()?;
        if self.batch.would_overflow(cmd) {
            self.flush()?;
        }
        self.batch.push(cmd);
        Ok(())
    }

    /// Hand the pending frame (if any) to the ARQ engine and transmit
    /// everything due.  Required before a synchronous read may depend on
    /// earlier writes being visible remotely.
    pub fn flush(&mut self) -> Result<(), WouError> {
        self.ensure_alive()?;
        if !self.batch.is_empty() {
            if !self.window.can_submit() {
                return Err(WouError::WindowFull {
                    in_flight: self.window.in_flight(),
                });
            }
            let (payload, reads) = self.batch.take();
            let tid = self.window.submit(payload, reads);
            log::debug!(
                "[wou] → CMD tid={} in_flight={}",
                tid,
                self.window.in_flight()
            );
        }
        self.pump_and_arm()
    }

    /// Read the last-known register bytes; pure local, never blocks.
    ///
    /// # Panics
    ///
    /// Panics when the range leaves the register space (host-side bug;
    /// remote accesses are validated at [`queue_command`](Self::queue_command)).
    pub fn read_shadow(&self, addr: u16, len: usize) -> &[u8] {
        self.shadow.read(addr, len)
    }

    // -----------------------------------------------------------------------
    // Realtime side-channel
    // -----------------------------------------------------------------------

    /// Encode `cmds` into the single realtime frame slot and transmit it,
    /// bypassing the ARQ window entirely.
    ///
    /// Never waits: if the channel is momentarily full the frame stays in
    /// the slot, where the next `rt_submit` overwrites it — losing a
    /// realtime frame is fine because the next control tick supersedes it.
    pub fn rt_submit(&mut self, cmds: &[Command<'_>]) -> Result<(), WouError> {
        self.ensure_alive()?;
        let mut payload = Vec::new();
        for cmd in cmds {
            cmd.validate()?;
            cmd.encode_into(&mut payload);
        }
        if payload.len() > MAX_PSIZE {
            return Err(WouError::PayloadTooLarge { len: payload.len() });
        }
        let bytes = Frame::new(TID_RT, kind::RT_CMD, payload).encode();
        // Latest wins: any frame still waiting in the slot is superseded.
        self.rt_slot = Some(bytes);
        self.rt_flush()
    }

    /// Try to push a deferred realtime frame out.
    fn rt_flush(&mut self) -> Result<(), WouError> {
        let Some(bytes) = self.rt_slot.take() else {
            return Ok(());
        };
        match self.channel.send(&bytes) {
            Ok(()) => {
                self.tx_bytes += bytes.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                // No retry machinery: park it for the next cycle or the
                // next rt_submit, whichever comes first.
                self.rt_slot = Some(bytes);
                Ok(())
            }
            Err(e) => self.fatal_io(e),
        }
    }

    // -----------------------------------------------------------------------
    // Receive path
    // -----------------------------------------------------------------------

    /// Drain available inbound bytes through the deframer and ARQ engine,
    /// invoke callbacks, and drive timeout-based retransmission.
    ///
    /// Call once per control tick, and again while waiting out a
    /// `WindowFull` condition.
    pub fn poll_receive(&mut self) -> Result<(), WouError> {
        self.ensure_alive()?;
        self.rt_flush()?;
        // Push out anything deferred by channel backpressure.
        self.pump_and_arm()?;

        loop {
            match self.channel.receive() {
                Ok(chunk) if chunk.is_empty() => break,
                Ok(chunk) => {
                    self.rx_bytes += chunk.len() as u64;
                    self.rx.extend(&chunk);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return self.fatal_io(e),
            }
        }

        while let Some(ev) = self.rx.next_event() {
            match ev {
                RxEvent::Frame(frame) => self.dispatch(frame),
                RxEvent::CrcError => {
                    self.crc_errors += 1;
                    log::debug!("[wou] ← CRC error #{}", self.crc_errors);
                    self.hooks.on_crc_error(self.crc_errors);
                    self.pending_recovery.get_or_insert("inbound CRC error");
                }
            }
        }

        if let Some(cause) = self.pending_recovery.take() {
            self.fast_retransmit(cause)?;
        }

        if self.window.has_unacked() && self.timer.expired(Instant::now()) {
            self.go_back_n("ack timeout")?;
        }
        Ok(())
    }

    /// Route one decoded inbound frame.
    fn dispatch(&mut self, frame: Frame) {
        match frame.header.kind {
            kind::ACK => self.on_remote_ack(frame.header.tid),
            kind::DATA => self.scatter_read_data(frame.header.tid, &frame.payload),
            kind::BPRU => {
                if frame.payload.len() >= 2 {
                    let addr = u16::from_be_bytes([frame.payload[0], frame.payload[1]]);
                    self.shadow.update(addr, &frame.payload[2..]);
                } else {
                    log::warn!("[wou] ← truncated BPRU frame");
                }
            }
            kind::MBOX => self.hooks.on_mailbox(&frame.payload),
            kind::RT_ACK => self.hooks.on_rt_result(&frame.payload),
            other => {
                // CMD/RT_CMD are host→device; seeing one inbound means the
                // stream synced onto reflected traffic.  Drop it.
                log::warn!("[wou] ← unexpected inbound kind {other:#04x}");
            }
        }
    }

    fn on_remote_ack(&mut self, rn: u8) {
        match self.window.on_ack(rn) {
            AckOutcome::Advanced(n) => {
                log::debug!("[wou] ← ACK Rn={rn} (slid {n})");
                self.timer.on_progress(Instant::now());
                if !self.window.has_unacked() {
                    self.timer.disarm();
                }
                // Progress supersedes loss signals from earlier in the
                // same burst; they refer to history the device has since
                // accepted.
                self.pending_recovery = None;
            }
            AckOutcome::Duplicate => {
                // The device is still asking for the window base.  One
                // lost frame draws a duplicate Rn per surviving frame
                // behind it; the whole burst amounts to a single
                // retransmission request.
                if self.window.has_unacked() {
                    self.pending_recovery.get_or_insert("duplicate Rn");
                }
            }
            AckOutcome::OutOfOrder => {
                log::warn!(
                    "[wou] ← out-of-order ACK Rn={rn} (Sb={} Sm={})",
                    self.window.sb(),
                    self.window.sm()
                );
                self.pending_recovery.get_or_insert("out-of-order Rn");
            }
        }
    }

    /// Copy read-response bytes into the shadow at the addresses the
    /// originating frame's READ records asked for.
    fn scatter_read_data(&mut self, tid: u8, payload: &[u8]) {
        let Some(reads) = self.window.reads_for(tid) else {
            // Slot already released (ACK raced ahead of the data frame) or
            // the tid is stale from before a reset.  Nothing to do safely.
            log::debug!("[wou] ← DATA tid={tid} with no retained read metadata");
            return;
        };
        let mut offset = 0usize;
        for span in reads {
            let end = offset + span.len as usize;
            if end > payload.len() {
                log::warn!(
                    "[wou] ← short DATA tid={tid}: have {} bytes, span wants {end}",
                    payload.len()
                );
                break;
            }
            self.shadow.update(span.addr, &payload[offset..end]);
            offset = end;
        }
    }

    // -----------------------------------------------------------------------
    // Transmission and recovery
    // -----------------------------------------------------------------------

    /// Transmit every frame the window has due (first sends and, after a
    /// rewind, retransmissions).  Returns the number of frames that left;
    /// channel backpressure stops the pump with the rest still queued.
    fn pump_tx(&mut self) -> Result<usize, WouError> {
        let mut sent = 0usize;
        let mut sent_bytes = 0u64;
        loop {
            let Some((tid, bytes)) = self.window.next_to_send() else {
                break;
            };
            match self.channel.send(bytes) {
                Ok(()) => {
                    sent += 1;
                    sent_bytes += bytes.len() as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    // Device buffer momentarily full: put the frame back
                    // and let the next cycle resume from here.
                    log::debug!("[wou] channel backpressure; tid={tid} deferred");
                    self.window.retreat();
                    break;
                }
                Err(e) => {
                    self.tx_bytes += sent_bytes;
                    return self.fatal_io(e);
                }
            }
        }
        self.tx_bytes += sent_bytes;
        Ok(sent)
    }

    /// Pump, then (re)start the ack deadline if something actually left.
    fn pump_and_arm(&mut self) -> Result<(), WouError> {
        if self.pump_tx()? > 0 && self.window.has_unacked() {
            self.timer.arm(Instant::now());
        }
        Ok(())
    }

    /// Loss-signal recovery: rewind to the window base and resend
    /// everything retained, in original order, byte-identical — at most
    /// once per receive drain, without charging the fatal retry budget.
    /// The ack deadline from the last window progress stays in place, so
    /// a link that never accepts the base frame still escalates through
    /// [`go_back_n`](Self::go_back_n).
    fn fast_retransmit(&mut self, cause: &str) -> Result<(), WouError> {
        if !self.window.has_unacked() {
            return Ok(());
        }
        log::debug!(
            "[wou] {cause} — fast retransmit ({} frame(s))",
            self.window.in_flight()
        );
        self.window.rewind();
        self.pump_tx()?;
        Ok(())
    }

    /// Timeout recovery: the same rewind-and-resend as
    /// [`fast_retransmit`](Self::fast_retransmit), but each firing counts
    /// toward the fatal retry budget, so a silent device eventually
    /// surfaces `LinkTimeout`.
    fn go_back_n(&mut self, cause: &str) -> Result<(), WouError> {
        if !self.window.has_unacked() {
            return Ok(());
        }
        let retries = self.timer.on_timeout(Instant::now());
        if self.timer.exhausted() {
            self.dead = true;
            return Err(WouError::LinkTimeout {
                retries,
                sb: self.window.sb(),
                sm: self.window.sm(),
                rn: self.window.rn(),
                crc_errors: self.crc_errors,
            });
        }
        log::debug!(
            "[wou] {cause} — going back N ({} frame(s), retry {retries})",
            self.window.in_flight()
        );
        self.window.rewind();
        self.pump_tx()?;
        Ok(())
    }

    fn fatal_io<T>(&mut self, e: io::Error) -> Result<T, WouError> {
        self.dead = true;
        log::warn!("[wou] channel I/O failure: {e}");
        Err(WouError::Io(e))
    }

    fn ensure_alive(&self) -> Result<(), WouError> {
        if self.dead {
            Err(WouError::LinkDown)
        } else {
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle and diagnostics
    // -----------------------------------------------------------------------

    /// Discard all retained frames, pending records, partial inbound bytes
    /// and the realtime slot; restore initial counters and revive the
    /// session.  The remote side must be reset in lockstep by the (external)
    /// bring-up code before traffic resumes.
    pub fn reset(&mut self) {
        self.window.reset();
        self.batch.clear();
        self.rx.clear();
        self.timer.reset();
        self.rt_slot = None;
        self.pending_recovery = None;
        self.dead = false;
        log::debug!("[wou] session reset");
    }

    /// Cumulative (transmitted, received) byte counts on the link.
    pub fn dsize(&self) -> (u64, u64) {
        (self.tx_bytes, self.rx_bytes)
    }

    /// Monotonic count of inbound frames discarded for bad CRC.
    pub fn crc_error_count(&self) -> u32 {
        self.crc_errors
    }

    /// ARQ window state, for diagnostics and tests.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// The underlying channel.  Bring-up code owns device lifecycle and may
    /// need the handle; tests use it to drive the simulated link.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// `true` after a fatal error, until [`reset`](Self::reset).
    pub fn is_dead(&self) -> bool {
        self.dead
    }
}
