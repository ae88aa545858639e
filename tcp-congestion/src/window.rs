//! Congestion-window bookkeeping for the sending side.
//!
//! [`CongestionWindow`] decides how many and which packets go out each round
//! and applies the end-of-round reaction. It does not touch the transport;
//! [`crate::controller::CongestionController`] owns the I/O loop.
//!
//! # Sequence-number layout
//!
//! ```text
//!  round_start              next_seq
//!      │                        │
//!  ────┼────────────────────────┼──────────────▶ seq space
//!      │ <── current batch ───▶ │ <── unsent ──▶
//! ```
//!
//! `next_seq` advances by `cwnd` as soon as a batch is built. On timeout it
//! is rewound to the packet that timed out, never below `round_start`.

use crate::packet::PacketId;
use crate::state::{Phase, WindowUpdate};

/// Initial congestion window, in packets.
pub const INITIAL_CWND: u64 = 1;

/// Initial slow-start threshold, in packets.
pub const INITIAL_SSTHRESH: u64 = 8;

#[derive(Debug, Clone)]
pub struct CongestionWindow {
    cwnd: u64,
    ssthresh: u64,
    /// Sequence number of the next packet that has not been sent.
    next_seq: u64,
    /// First sequence number of the most recent batch.
    round_start: u64,
}

impl Default for CongestionWindow {
    fn default() -> Self {
        Self::new(INITIAL_CWND, INITIAL_SSTHRESH)
    }
}

impl CongestionWindow {
    /// Create a window starting at packet 1.
    ///
    /// `cwnd` is clamped to at least one packet.
    pub fn new(cwnd: u64, ssthresh: u64) -> Self {
        Self {
            cwnd: cwnd.max(1),
            ssthresh,
            next_seq: 1,
            round_start: 1,
        }
    }

    pub fn cwnd(&self) -> u64 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> u64 {
        self.ssthresh
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn phase(&self) -> Phase {
        Phase::of(self.cwnd, self.ssthresh)
    }

    /// Allocate exactly `cwnd` consecutive identifiers starting at
    /// `next_seq`, and advance `next_seq` past them.
    pub fn build_batch(&mut self) -> Vec<PacketId> {
        self.round_start = self.next_seq;
        let batch = (self.next_seq..self.next_seq + self.cwnd)
            .map(PacketId::new)
            .collect();
        self.next_seq += self.cwnd;
        batch
    }

    /// Timeout reaction: rewind to `lost`, halve the threshold from the
    /// pre-timeout window (truncating, so it may reach 0), reset `cwnd` to 1.
    pub fn on_timeout(&mut self, lost: PacketId) -> WindowUpdate {
        debug_assert!(
            (self.round_start..self.next_seq).contains(&lost.seq()),
            "timed-out packet {lost} is outside the current batch"
        );
        self.next_seq = lost.seq().max(self.round_start);
        self.ssthresh = self.cwnd / 2;
        self.cwnd = 1;
        WindowUpdate::Timeout {
            ssthresh: self.ssthresh,
            cwnd: self.cwnd,
        }
    }

    /// Growth reaction after a round in which every packet was acknowledged.
    pub fn on_clean_round(&mut self) -> WindowUpdate {
        match self.phase() {
            Phase::SlowStart => {
                self.cwnd *= 2;
                WindowUpdate::SlowStart { cwnd: self.cwnd }
            }
            Phase::CongestionAvoidance => {
                self.cwnd += 1;
                WindowUpdate::CongestionAvoidance { cwnd: self.cwnd }
            }
        }
    }

    /// The round was cut short by the termination token; nothing changes.
    pub fn on_terminated(&self) -> WindowUpdate {
        WindowUpdate::Unchanged { cwnd: self.cwnd }
    }
}
