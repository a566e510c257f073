//! Wire-format definitions for WOU frames.
//!
//! Every transmission on the USB bulk link is a [`Frame`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (header fields, payload, CRC).
//! - Serialising a [`Frame`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Frame`], returning errors
//!   for truncated or corrupted input.
//!
//! No I/O happens here — this is pure data transformation.  Byte-stream
//! reassembly and resynchronisation live in [`crate::deframer`].
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//! +---------------+---------------+---------------+---------------+
//! |      tid      |     kind      |          payload length       |
//! +---------------+---------------+---------------+---------------+
//! |                        payload ...                            |
//! +---------------+---------------+---------------+---------------+
//! |             CRC-16            |
//! +---------------+---------------+
//! ```
//!
//! `tid` is the mod-256 Go-Back-N sequence number for bulk command frames;
//! for ACK frames it carries the cumulative request number `Rn` instead.
//! Realtime frames use the reserved [`TID_RT`].  The CRC-16 (IBM-SDLC
//! polynomial) covers header plus payload.

use crc::{Crc, CRC_16_IBM_SDLC};

/// Byte length of the fixed-size header on the wire.
pub const WOUF_HDR_SIZE: usize = 4;

/// Byte length of the trailing CRC-16.
pub const CRC_SIZE: usize = 2;

/// Maximum data size of a single command record.
pub const MAX_DSIZE: usize = 256;

/// Maximum frame payload: one maximal command record (3-byte record header
/// plus [`MAX_DSIZE`] data bytes) must always fit in a single frame.
pub const MAX_PSIZE: usize = 3 + MAX_DSIZE;

/// Reserved tid carried by realtime frames (no window membership).
pub const TID_RT: u8 = 0xFF;

// Byte offsets of each field within the serialised header.
const OFF_TID: usize = 0;
const OFF_KIND: usize = 1;
const OFF_PLOAD_LEN: usize = 2;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);

/// Frame-type constants for the `kind` header field.
///
/// The kind byte doubles as the resynchronisation anchor: a header whose
/// kind is not in this set is treated as noise by the deframer.
pub mod kind {
    /// Host → device: bulk command frame (windowed, acknowledged).
    pub const CMD: u8 = 0x01;
    /// Host → device: realtime command frame (window-exempt, no retry).
    pub const RT_CMD: u8 = 0x02;
    /// Device → host: cumulative acknowledgment; `tid` carries `Rn`.
    pub const ACK: u8 = 0x11;
    /// Device → host: read-response data; `tid` names the originating frame.
    pub const DATA: u8 = 0x12;
    /// Device → host: unsolicited mailbox message.
    pub const MBOX: u8 = 0x14;
    /// Device → host: base-period register update (addr + register bytes).
    pub const BPRU: u8 = 0x16;
    /// Device → host: realtime command response.
    pub const RT_ACK: u8 = 0x18;

    /// `true` when `k` is a kind value this host understands.
    pub fn is_valid(k: u8) -> bool {
        matches!(k, CMD | RT_CMD | ACK | DATA | MBOX | BPRU | RT_ACK)
    }
}

/// Fixed-size protocol header.
///
/// Fields are in host byte order; [`Frame::encode`] converts to big-endian
/// on the wire and [`Frame::decode`] converts back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Sequence number (bulk), request number `Rn` (ACK), or [`TID_RT`].
    pub tid: u8,
    /// One of the [`kind`] constants.
    pub kind: u8,
    /// Length of the payload in bytes, `0..=`[`MAX_PSIZE`].
    pub pload_len: u16,
}

/// A complete WOU frame: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a frame; `payload` must not exceed [`MAX_PSIZE`] (the batcher
    /// and realtime layers enforce this before frames are constructed).
    pub fn new(tid: u8, kind: u8, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PSIZE);
        Self {
            header: Header {
                tid,
                kind,
                pload_len: payload.len() as u16,
            },
            payload,
        }
    }

    /// Total framed length for a payload of `pload_len` bytes.
    pub fn framed_len(pload_len: usize) -> usize {
        WOUF_HDR_SIZE + pload_len + CRC_SIZE
    }

    /// Serialise this frame into a newly allocated byte vector.
    ///
    /// `header.pload_len` is taken from the actual payload; the CRC is
    /// computed and appended last.
    pub fn encode(&self) -> Vec<u8> {
        let pload_len = self.payload.len();
        let mut buf = Vec::with_capacity(Self::framed_len(pload_len));

        buf.push(self.header.tid);
        buf.push(self.header.kind);
        buf.extend_from_slice(&(pload_len as u16).to_be_bytes());
        buf.extend_from_slice(&self.payload);

        let csum = CRC16.checksum(&buf);
        buf.extend_from_slice(&csum.to_be_bytes());
        buf
    }

    /// Parse a [`Frame`] from a raw byte slice holding exactly one frame.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than header + CRC,
    /// - the `pload_len` field disagrees with `buf.len()`, or
    /// - the CRC does not verify.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < WOUF_HDR_SIZE + CRC_SIZE {
            return Err(FrameError::BufferTooShort);
        }

        let tid = buf[OFF_TID];
        let kind = buf[OFF_KIND];
        let pload_len =
            u16::from_be_bytes(buf[OFF_PLOAD_LEN..OFF_PLOAD_LEN + 2].try_into().unwrap());

        if buf.len() != Self::framed_len(pload_len as usize) {
            return Err(FrameError::LengthMismatch);
        }

        let crc_off = buf.len() - CRC_SIZE;
        let stored = u16::from_be_bytes(buf[crc_off..].try_into().unwrap());
        if CRC16.checksum(&buf[..crc_off]) != stored {
            return Err(FrameError::CrcMismatch);
        }

        Ok(Frame {
            header: Header {
                tid,
                kind,
                pload_len,
            },
            payload: buf[WOUF_HDR_SIZE..crc_off].to_vec(),
        })
    }
}

/// Errors that can arise when parsing a serialised frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Buffer shorter than header plus CRC.
    #[error("buffer too short to contain a frame")]
    BufferTooShort,
    /// `pload_len` field does not match the actual buffer length.
    #[error("pload_len field does not match buffer length")]
    LengthMismatch,
    /// CRC-16 did not match the recomputed value.
    #[error("CRC verification failed")]
    CrcMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let f = Frame::new(42, kind::CMD, b"hello".to_vec());
        let decoded = Frame::decode(&f.encode()).unwrap();
        assert_eq!(decoded.header.tid, 42);
        assert_eq!(decoded.header.kind, kind::CMD);
        assert_eq!(decoded.header.pload_len, 5);
        assert_eq!(decoded.payload, b"hello");
    }

    #[test]
    fn empty_payload_roundtrip() {
        let f = Frame::new(0, kind::ACK, vec![]);
        let decoded = Frame::decode(&f.encode()).unwrap();
        assert_eq!(decoded.payload, Vec::<u8>::new());
        assert_eq!(decoded.header.pload_len, 0);
    }

    #[test]
    fn max_payload_roundtrip() {
        let f = Frame::new(7, kind::CMD, vec![0xA5; MAX_PSIZE]);
        let decoded = Frame::decode(&f.encode()).unwrap();
        assert_eq!(decoded.payload.len(), MAX_PSIZE);
    }

    #[test]
    fn encoded_length_equals_header_plus_payload_plus_crc() {
        let f = Frame::new(1, kind::CMD, vec![0; 10]);
        assert_eq!(f.encode().len(), WOUF_HDR_SIZE + 10 + CRC_SIZE);
    }

    #[test]
    fn pload_len_big_endian_on_wire() {
        let f = Frame::new(0, kind::CMD, vec![0; 0x0103]);
        let bytes = f.encode();
        assert_eq!(&bytes[OFF_PLOAD_LEN..OFF_PLOAD_LEN + 2], &[0x01, 0x03]);
    }

    #[test]
    fn decode_empty_buffer_returns_error() {
        assert_eq!(Frame::decode(&[]), Err(FrameError::BufferTooShort));
    }

    #[test]
    fn decode_truncated_payload_returns_error() {
        let mut bytes = Frame::new(0, kind::CMD, b"data".to_vec()).encode();
        bytes.pop(); // pload_len still claims 4 bytes
        assert_eq!(Frame::decode(&bytes), Err(FrameError::LengthMismatch));
    }

    #[test]
    fn corrupt_byte_returns_crc_error() {
        let mut bytes = Frame::new(99, kind::DATA, b"test".to_vec()).encode();
        bytes[5] ^= 0xFF;
        assert_eq!(Frame::decode(&bytes), Err(FrameError::CrcMismatch));
    }

    #[test]
    fn corrupt_header_returns_crc_error() {
        let mut bytes = Frame::new(99, kind::DATA, b"test".to_vec()).encode();
        bytes[0] ^= 0x01; // flip a tid bit; length still consistent
        assert_eq!(Frame::decode(&bytes), Err(FrameError::CrcMismatch));
    }

    #[test]
    fn kind_validity_set() {
        assert!(kind::is_valid(kind::CMD));
        assert!(kind::is_valid(kind::BPRU));
        assert!(!kind::is_valid(0x00));
        assert!(!kind::is_valid(0xFF));
    }

    #[test]
    fn retransmission_is_byte_identical() {
        let f = Frame::new(3, kind::CMD, vec![1, 2, 3]);
        assert_eq!(f.encode(), f.encode());
    }
}
