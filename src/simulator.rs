//! Scripted link simulator for deterministic testing.
//!
//! Real USB links drop, corrupt, and arbitrarily re-chunk bytes.  To
//! exercise the reliability machinery without hardware, [`SimChannel`]
//! implements [`Transport`] entirely in memory:
//!
//! | Fault          | How it is scripted                                      |
//! |----------------|---------------------------------------------------------|
//! | Send failure   | [`SimChannel::fail_next_send`] queues an error per call |
//! | Inbound loss   | simply do not script the chunk                          |
//! | Corruption     | script a chunk with flipped bytes                       |
//! | Re-chunking    | [`SimChannel::push_rx_chunked`] splits into small reads |
//!
//! Everything is scripted rather than randomised so failures reproduce
//! exactly.  Production builds talk to a real driver wrapper; this type is
//! compiled into the library so integration tests and downstream test
//! suites can share it.

use std::collections::VecDeque;
use std::io;

use crate::transport::Transport;

/// An in-memory, script-driven [`Transport`].
#[derive(Debug, Default)]
pub struct SimChannel {
    /// Every buffer the host sent, in order, minus faulted calls.
    sent: Vec<Vec<u8>>,
    /// Chunks queued for delivery to the host.
    rx: VecDeque<Vec<u8>>,
    /// Error kinds to return from upcoming `send` calls, FIFO.
    send_faults: VecDeque<io::ErrorKind>,
    /// Error kind to return from the next `receive` call, if any.
    recv_fault: Option<io::ErrorKind>,
}

impl SimChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one inbound chunk exactly as scripted.
    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.push_back(bytes.to_vec());
    }

    /// Queue `bytes` split into `chunk` -byte reads, exercising reassembly.
    pub fn push_rx_chunked(&mut self, bytes: &[u8], chunk: usize) {
        assert!(chunk > 0);
        for piece in bytes.chunks(chunk) {
            self.rx.push_back(piece.to_vec());
        }
    }

    /// Make the next `send` call fail with `kind` (repeat to stack faults).
    pub fn fail_next_send(&mut self, kind: io::ErrorKind) {
        self.send_faults.push_back(kind);
    }

    /// Make the next `receive` call fail with `kind`.
    pub fn fail_next_recv(&mut self, kind: io::ErrorKind) {
        self.recv_fault = Some(kind);
    }

    /// Buffers sent so far (oldest first).
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Drain and return everything sent so far.
    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }

    /// Number of inbound chunks not yet delivered.
    pub fn rx_pending(&self) -> usize {
        self.rx.len()
    }
}

impl Transport for SimChannel {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if let Some(kind) = self.send_faults.pop_front() {
            return Err(io::Error::new(kind, "scripted send fault"));
        }
        self.sent.push(bytes.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> io::Result<Vec<u8>> {
        if let Some(kind) = self.recv_fault.take() {
            return Err(io::Error::new(kind, "scripted receive fault"));
        }
        Ok(self.rx.pop_front().unwrap_or_default())
    }
}
