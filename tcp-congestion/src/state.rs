//! Congestion-control phase types.
//!
//! The sender is always in one of two growth phases, decided purely by the
//! relation between `cwnd` and `ssthresh`. Transitions are applied in
//! [`crate::window`]; this module only names them.
//!
//! ```text
//!                 cwnd ≥ ssthresh
//!  SLOW_START ───────────────────────▶ CONGESTION_AVOIDANCE
//!  (cwnd *= 2)                         (cwnd += 1)
//!      ▲                                       │
//!      └──────────── timeout ──────────────────┘
//!           ssthresh = cwnd / 2, cwnd = 1
//! ```
//!
//! A timeout lands in `SLOW_START` only while `ssthresh > 1`; with a
//! threshold of 0 or 1 the reset window already satisfies `cwnd ≥ ssthresh`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// `cwnd < ssthresh`: the window doubles after each clean round.
    #[default]
    SlowStart,
    /// `cwnd ≥ ssthresh`: the window grows by one after each clean round.
    CongestionAvoidance,
}

impl Phase {
    pub fn of(cwnd: u64, ssthresh: u64) -> Self {
        if cwnd < ssthresh {
            Phase::SlowStart
        } else {
            Phase::CongestionAvoidance
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::SlowStart => f.write_str("Slow Start"),
            Phase::CongestionAvoidance => f.write_str("Congestion Avoidance"),
        }
    }
}

/// The window decision taken at the end of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowUpdate {
    /// Clean round in slow start; `cwnd` doubled.
    SlowStart { cwnd: u64 },
    /// Clean round in congestion avoidance; `cwnd` grew by one.
    CongestionAvoidance { cwnd: u64 },
    /// A packet timed out; the window collapsed.
    Timeout { ssthresh: u64, cwnd: u64 },
    /// The termination token ended the round; the window was left untouched.
    Unchanged { cwnd: u64 },
}

impl WindowUpdate {
    /// Window size in force for the next round.
    pub fn cwnd(self) -> u64 {
        match self {
            WindowUpdate::SlowStart { cwnd }
            | WindowUpdate::CongestionAvoidance { cwnd }
            | WindowUpdate::Timeout { cwnd, .. }
            | WindowUpdate::Unchanged { cwnd } => cwnd,
        }
    }
}

impl fmt::Display for WindowUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowUpdate::SlowStart { cwnd } => write!(f, "Slow Start: cwnd -> {cwnd}"),
            WindowUpdate::CongestionAvoidance { cwnd } => {
                write!(f, "Congestion Avoidance: cwnd -> {cwnd}")
            }
            WindowUpdate::Timeout { ssthresh, cwnd } => {
                write!(f, "Timeout: ssthresh -> {ssthresh}, cwnd -> {cwnd}")
            }
            WindowUpdate::Unchanged { cwnd } => write!(f, "Transfer ended: cwnd stays {cwnd}"),
        }
    }
}
