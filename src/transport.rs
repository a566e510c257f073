//! Raw-channel abstraction over the USB bulk link.
//!
//! Device enumeration, opening, and bring-up are owned by external code; the
//! protocol core only needs an already-connected, ordered-but-lossy byte
//! pipe.  [`Transport`] is that seam: the session is generic over it, real
//! deployments wrap their FTDI-style driver handle, and tests plug in
//! [`crate::simulator::SimChannel`].

use std::io;

/// A bidirectional, ordered, possibly lossy byte channel.
pub trait Transport {
    /// Queue `bytes` for transmission.
    ///
    /// The call must accept the whole buffer or fail; partial writes are
    /// not modelled (USB bulk drivers buffer whole transfers).  An error of
    /// kind [`io::ErrorKind::WouldBlock`] means the device-side buffer is
    /// momentarily full — the bulk pump defers the frame to the next cycle,
    /// the realtime path parks its frame for overwrite, and every other
    /// error is fatal to the session.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Return the bytes currently available, chunked arbitrarily.
    ///
    /// An empty vector (or [`io::ErrorKind::WouldBlock`]) means nothing is
    /// pending right now; chunk boundaries carry no meaning and never align
    /// with frame boundaries.
    fn receive(&mut self) -> io::Result<Vec<u8>>;
}
