//! Command records and pending-frame batching.
//!
//! A [`Command`] is one wishbone register access.  The [`Batcher`] packs the
//! encoded records of successive commands into the payload of the next
//! outbound frame; when a record would overflow [`MAX_PSIZE`] the session
//! flushes the pending frame first (an implicit flush) and the record starts
//! a fresh one.  Records are never reordered or coalesced — FIFO-mode writes
//! in particular must reach the device in program order, because the remote
//! FIFO depth is the backpressure mechanism.
//!
//! # Record wire format
//!
//! ```text
//! +---------------------+---------------+---------------+=============+
//! | op | addr[13:8]     |   addr[7:0]   |     dsize     |  data ...   |
//! +---------------------+---------------+---------------+=============+
//!   bits [7:6] = op        low byte of      1..=256,       WRITE only
//!   bits [5:0] = addr_hi   the address      0 means 256
//! ```
//!
//! `op` combines [`WB_RD_CMD`]/[`WB_WR_CMD`] with [`WB_AI_MODE`]/
//! [`WB_FIFO_MODE`].  READ records carry no data; the device answers with a
//! data frame whose bytes land in the register shadow.

use crate::error::WouError;
use crate::frame::{MAX_DSIZE, MAX_PSIZE};
use crate::regs::{WB_AI_MODE, WB_FIFO_MODE, WB_RD_CMD, WB_REG_SIZE, WB_WR_CMD};

/// Byte length of a command-record header.
pub const RECORD_HDR_SIZE: usize = 3;

/// Addressing mode of a command record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Each transferred byte goes to the next address.
    AddrInc,
    /// Constant address; the device treats each access as a FIFO push/pop.
    Fifo,
}

impl Mode {
    fn bits(self) -> u8 {
        match self {
            Mode::AddrInc => WB_AI_MODE,
            Mode::Fifo => WB_FIFO_MODE,
        }
    }
}

/// One register access, as issued by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Request `len` bytes starting at `addr`; the response is scattered
    /// into the register shadow.
    Read { mode: Mode, addr: u16, len: usize },
    /// Transfer `data` to `addr`.
    Write { mode: Mode, addr: u16, data: &'a [u8] },
}

impl Command<'_> {
    /// Transfer length in bytes.
    pub fn dsize(&self) -> usize {
        match self {
            Command::Read { len, .. } => *len,
            Command::Write { data, .. } => data.len(),
        }
    }

    /// Target address.
    pub fn addr(&self) -> u16 {
        match self {
            Command::Read { addr, .. } | Command::Write { addr, .. } => *addr,
        }
    }

    fn mode(&self) -> Mode {
        match self {
            Command::Read { mode, .. } | Command::Write { mode, .. } => *mode,
        }
    }

    /// Encoded record length: header plus data (WRITE only).
    pub fn record_len(&self) -> usize {
        match self {
            Command::Read { .. } => RECORD_HDR_SIZE,
            Command::Write { data, .. } => RECORD_HDR_SIZE + data.len(),
        }
    }

    /// Validate address range and transfer size.
    ///
    /// FIFO-mode writes push `dsize` bytes at a constant address, so only
    /// the target address itself must be in range; address-increment
    /// transfers must fit entirely inside the register space.
    pub fn validate(&self) -> Result<(), WouError> {
        let len = self.dsize();
        if len == 0 || len > MAX_DSIZE {
            return Err(WouError::PayloadTooLarge { len });
        }
        let addr = self.addr();
        let span = match self.mode() {
            Mode::AddrInc => len,
            Mode::Fifo => 1,
        };
        if (addr as usize) + span > WB_REG_SIZE {
            return Err(WouError::AddressOutOfRange { addr, len });
        }
        Ok(())
    }

    /// Append the encoded record to `out`.  The command must validate first.
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        let op = match self {
            Command::Read { .. } => WB_RD_CMD,
            Command::Write { .. } => WB_WR_CMD,
        };
        let addr = self.addr();
        // dsize 256 is encoded as 0 (the record never transfers 0 bytes).
        let dsize = (self.dsize() & 0xFF) as u8;
        out.push(op | self.mode().bits() | (addr >> 8) as u8);
        out.push((addr & 0xFF) as u8);
        out.push(dsize);
        if let Command::Write { data, .. } = self {
            out.extend_from_slice(data);
        }
    }
}

/// Where a read response's bytes belong in the register shadow.
///
/// One span per READ record in a frame, in record order; the device answers
/// with the concatenated data in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSpan {
    pub addr: u16,
    pub len: u16,
}

/// Accumulates encoded command records into the next outbound payload.
#[derive(Debug, Default)]
pub struct Batcher {
    pending: Vec<u8>,
    reads: Vec<ReadSpan>,
}

impl Batcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// `true` when appending `cmd` would exceed the frame payload limit,
    /// forcing the current pending frame out first.
    pub fn would_overflow(&self, cmd: &Command<'_>) -> bool {
        self.pending.len() + cmd.record_len() > MAX_PSIZE
    }

    /// Append a validated command record.
    ///
    /// The caller is responsible for flushing first when
    /// [`would_overflow`](Self::would_overflow) — a single record always
    /// fits in an empty payload by construction of [`MAX_PSIZE`].
    pub fn push(&mut self, cmd: &Command<'_>) {
        debug_assert!(!self.would_overflow(cmd));
        cmd.encode_into(&mut self.pending);
        if let Command::Read { addr, len, .. } = cmd {
            self.reads.push(ReadSpan {
                addr: *addr,
                len: *len as u16,
            });
        }
    }

    /// Hand over the pending payload and its read metadata, leaving the
    /// batcher empty for the next frame.
    pub fn take(&mut self) -> (Vec<u8>, Vec<ReadSpan>) {
        (
            std::mem::take(&mut self.pending),
            std::mem::take(&mut self.reads),
        )
    }

    /// Drop any pending records (link reset).
    pub fn clear(&mut self) {
        self.pending.clear();
        self.reads.clear();
    }
}
