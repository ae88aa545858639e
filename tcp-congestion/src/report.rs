//! Progress reporting.
//!
//! The controller narrates each round as a stream of [`RoundEvent`]s handed
//! to an [`Observer`]. Observers only watch: nothing they do can reach back
//! into controller state, since they receive shared references to values
//! the controller has already committed.

use std::fmt;
use std::io::Write;

use crate::mode::Mode;
use crate::packet::{join_ids, PacketId};
use crate::state::{Phase, WindowUpdate};

/// One observable step of a simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    /// Emitted once by `Simulation::run`, before the handshake.
    Configured { mode: Mode, total_rounds: u32 },
    RoundStarted {
        round: u32,
        cwnd: u64,
        ssthresh: u64,
        phase: Phase,
    },
    Sent { round: u32, packets: Vec<PacketId> },
    AckReceived {
        packet: PacketId,
        token: String,
        sample_rtt_ms: f64,
        timeout_interval_ms: f64,
    },
    TimedOut { packet: PacketId },
    /// The termination token was received while waiting on `packet`.
    Terminated { round: u32, packet: PacketId },
    WindowUpdated { round: u32, update: WindowUpdate },
}

impl fmt::Display for RoundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundEvent::Configured { mode, total_rounds } => {
                write!(f, "== TCP {mode} Mode == ({total_rounds} rounds)")
            }
            RoundEvent::RoundStarted {
                round,
                cwnd,
                ssthresh,
                ..
            } => write!(f, "Round {round}: cwnd={cwnd}, ssthresh={ssthresh}"),
            RoundEvent::Sent { packets, .. } => {
                write!(f, "Sent packets: {}", join_ids(packets))
            }
            RoundEvent::AckReceived {
                token,
                sample_rtt_ms,
                ..
            } => write!(f, "Received ACK: {token} (SampleRTT={sample_rtt_ms:.2}ms)"),
            RoundEvent::TimedOut { packet } => {
                write!(f, "==> Timeout occurred for packet: {packet}")
            }
            RoundEvent::Terminated { packet, .. } => {
                write!(f, "Received END while waiting for {packet}")
            }
            RoundEvent::WindowUpdated { update, .. } => write!(f, "{update}"),
        }
    }
}

/// Receiver of progress events.
pub trait Observer {
    fn observe(&mut self, event: &RoundEvent);
}

/// Collects events, mostly for tests.
impl Observer for Vec<RoundEvent> {
    fn observe(&mut self, event: &RoundEvent) {
        self.push(event.clone());
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn observe(&mut self, _event: &RoundEvent) {}
}

/// Routes events through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn observe(&mut self, event: &RoundEvent) {
        match event {
            RoundEvent::AckReceived {
                timeout_interval_ms,
                ..
            } => log::debug!("[cc] {event} timeout={timeout_interval_ms:.2}ms"),
            RoundEvent::Sent { .. } => log::debug!("[cc] {event}"),
            RoundEvent::TimedOut { .. } => log::warn!("[cc] {event}"),
            _ => log::info!("[cc] {event}"),
        }
    }
}

/// Writes the human-readable round summary, one event per line, with a
/// blank line before each round.
#[derive(Debug)]
pub struct ConsoleObserver<W: Write> {
    out: W,
}

impl ConsoleObserver<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Observer for ConsoleObserver<W> {
    fn observe(&mut self, event: &RoundEvent) {
        let written = match event {
            RoundEvent::RoundStarted { .. } | RoundEvent::Configured { .. } => {
                writeln!(self.out, "\n{event}")
            }
            _ => writeln!(self.out, "{event}"),
        };
        // A closed console must not abort the run; the log still has it.
        if let Err(e) = written {
            log::warn!("[report] console write failed: {e}");
        }
    }
}

/// Fans one event stream out to two observers.
#[derive(Debug)]
pub struct Tee<A, B>(pub A, pub B);

impl<A: Observer, B: Observer> Observer for Tee<A, B> {
    fn observe(&mut self, event: &RoundEvent) {
        self.0.observe(event);
        self.1.observe(event);
    }
}
