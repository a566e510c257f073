//! Session-level error taxonomy.
//!
//! Transient link noise (CRC errors, single timeouts) is absorbed by the
//! Go-Back-N engine and never appears here.  What does appear is either a
//! caller programming error (`AddressOutOfRange`, `PayloadTooLarge`), a
//! retryable backpressure condition (`WindowFull`), or a session-ending
//! fault that requires an explicit [`reset`](crate::session::Session::reset)
//! before the channel may be reused.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WouError {
    /// `address + length` leaves the 16K register space.  Programming
    /// error; not retried.
    #[error("address out of range: addr={addr:#06x} len={len}")]
    AddressOutOfRange { addr: u16, len: usize },

    /// A single command record's data exceeds MAX_DSIZE (or is empty).
    /// Programming error; not retried.
    #[error("payload too large for one command record: len={len}")]
    PayloadTooLarge { len: usize },

    /// The Go-Back-N window is full.  Retryable: drain a receive cycle
    /// with `poll_receive` and call again.
    #[error("ARQ window full ({in_flight} frames in flight)")]
    WindowFull { in_flight: u8 },

    /// The retransmission limit was exceeded without an acknowledgment.
    /// Fatal; the channel must be reset before reuse.
    #[error(
        "link timeout: {retries} consecutive retransmissions unacknowledged \
         (Sb={sb} Sm={sm} Rn={rn} crc_errors={crc_errors})"
    )]
    LinkTimeout {
        retries: u32,
        sb: u8,
        sm: u8,
        rn: u8,
        crc_errors: u32,
    },

    /// The session was already declared dead by an earlier fatal error.
    #[error("link is down; reset the session before reuse")]
    LinkDown,

    /// I/O failure from the raw channel.  Fatal; the core does not reopen
    /// the underlying device.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WouError {
    /// `true` for conditions the caller may simply retry after draining a
    /// receive cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WouError::WindowFull { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_full_is_retryable() {
        assert!(WouError::WindowFull { in_flight: 64 }.is_retryable());
        assert!(!WouError::LinkDown.is_retryable());
        assert!(!WouError::PayloadTooLarge { len: 300 }.is_retryable());
    }

    #[test]
    fn link_timeout_reports_window_context() {
        let e = WouError::LinkTimeout {
            retries: 8,
            sb: 3,
            sm: 9,
            rn: 3,
            crc_errors: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains("Sb=3"));
        assert!(msg.contains("crc_errors=2"));
    }
}
