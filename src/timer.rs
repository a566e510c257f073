//! Retransmit timeout management.
//!
//! Reliable delivery requires that unacknowledged frames are re-sent when no
//! acknowledgment arrives within a bounded time.  [`RetransmitTimer`] tracks
//! the deadline for the oldest unacknowledged frame and applies exponential
//! back-off on consecutive timeouts (RFC 6298 §5.5 style), capped at a
//! configurable maximum.  The session escalates to a fatal link error once
//! the consecutive-timeout count passes `max_retries`.
//!
//! The timer holds no task or thread: the session's poll loop asks
//! [`expired`](RetransmitTimer::expired) with the current instant, keeping
//! all time handling inside the single channel owner.

use std::time::{Duration, Instant};

/// Adjustable timeout parameters.
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// RTO before any back-off has been applied.
    pub initial_rto: Duration,
    /// Maximum RTO after repeated back-off.
    pub max_rto: Duration,
    /// Consecutive unacknowledged retransmissions before the link is
    /// declared dead.
    pub max_retries: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            initial_rto: Duration::from_millis(50),
            max_rto: Duration::from_secs(1),
            max_retries: 8,
        }
    }
}

/// Retransmit deadline for one channel's window.
#[derive(Debug)]
pub struct RetransmitTimer {
    config: TimerConfig,
    /// Current RTO including back-off.
    current_rto: Duration,
    /// When the frame now at the window base was last (re)transmitted;
    /// `None` while nothing is in flight.
    armed_at: Option<Instant>,
    /// Consecutive timeouts without window progress.
    retries: u32,
}

impl RetransmitTimer {
    pub fn new(config: TimerConfig) -> Self {
        let current_rto = config.initial_rto;
        Self {
            config,
            current_rto,
            armed_at: None,
            retries: 0,
        }
    }

    /// Start (or restart) the deadline; called after transmitting while
    /// frames are in flight.
    pub fn arm(&mut self, now: Instant) {
        self.armed_at = Some(now);
    }

    /// Stop the deadline; called when the window empties.
    pub fn disarm(&mut self) {
        self.armed_at = None;
    }

    /// `true` when armed and the current RTO has elapsed.
    pub fn expired(&self, now: Instant) -> bool {
        match self.armed_at {
            Some(t) => now.duration_since(t) >= self.current_rto,
            None => false,
        }
    }

    /// The window advanced: clear back-off and re-arm for the new base.
    pub fn on_progress(&mut self, now: Instant) {
        self.retries = 0;
        self.current_rto = self.config.initial_rto;
        self.armed_at = Some(now);
    }

    /// A timeout fired: double the RTO (capped), re-arm, and return the
    /// consecutive-timeout count.
    pub fn on_timeout(&mut self, now: Instant) -> u32 {
        self.retries += 1;
        self.current_rto = (self.current_rto * 2).min(self.config.max_rto);
        self.armed_at = Some(now);
        self.retries
    }

    /// `true` once the consecutive-timeout count exceeds the configured
    /// limit.
    pub fn exhausted(&self) -> bool {
        self.retries > self.config.max_retries
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Restore the initial state (channel reset).
    pub fn reset(&mut self) {
        self.retries = 0;
        self.current_rto = self.config.initial_rto;
        self.armed_at = None;
    }
}
