//! `wou` — the host side of Wishbone-over-USB (WOU), a reliable
//! command/response protocol for driving an FPGA-hosted wishbone register
//! bus (motion-control GPIO, joint-command FIFOs, servo/stepper interfaces)
//! across a USB bulk link.
//!
//! # Architecture
//!
//! ```text
//!  control loop (sub-millisecond base period)
//!       │ queue_command / flush / rt_submit / read_shadow / poll_receive
//!  ┌────▼──────────────────────────────────┐
//!  │              Session                  │
//!  │  (single owner: batching, dispatch,   │
//!  │   callbacks, retransmit policy)       │
//!  └──┬─────────┬──────────┬───────────────┘
//!     │         │          │
//!  ┌──▼─────┐ ┌─▼──────┐ ┌─▼───────────┐
//!  │Batcher │ │Window  │ │RegisterShadow│
//!  │records │ │GBN ARQ │ │16K mirror    │
//!  └────────┘ └─┬──────┘ └──────────────┘
//!               │ encoded frames        ▲
//!  ┌────────────▼──────┐   ┌────────────┴──┐
//!  │  Frame / encode   │   │   Deframer    │
//!  └────────────┬──────┘   └────────────▲──┘
//!               │ raw bytes             │
//!  ┌────────────▼───────────────────────┴──┐
//!  │        Transport (USB bulk link)      │
//!  └───────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`frame`]     — wire format (serialise / deserialise, CRC-16)
//! - [`deframer`]  — byte-stream reassembly and resynchronisation
//! - [`window`]    — Go-Back-N outbound window and circular frame store
//! - [`batch`]     — command records and pending-frame accumulation
//! - [`shadow`]    — local mirror of the remote register space
//! - [`regs`]      — wishbone address-map constants
//! - [`timer`]     — retransmit timeout with exponential back-off
//! - [`transport`] — the raw-channel trait the session is generic over
//! - [`session`]   — the synchronous per-board API and dispatch layer
//! - [`simulator`] — scripted in-memory channel for deterministic tests
//! - [`error`]     — session-level error taxonomy
//!
//! # Reliability model
//!
//! Bulk commands travel through a 64-frame Go-Back-N window: transient CRC
//! errors and single timeouts are repaired by full-window retransmission
//! and stay invisible to the application, while sustained loss escalates to
//! a fatal [`WouError::LinkTimeout`].  The realtime side-channel bypasses
//! the window entirely: one overwrite slot, no retry, because the next
//! control tick supersedes a lost frame anyway.

pub mod batch;
pub mod deframer;
pub mod error;
pub mod frame;
pub mod regs;
pub mod session;
pub mod shadow;
pub mod simulator;
pub mod timer;
pub mod transport;
pub mod window;

pub use batch::{Command, Mode};
pub use error::WouError;
pub use session::{EventHooks, NullHooks, Session};
pub use timer::TimerConfig;
pub use transport::Transport;
