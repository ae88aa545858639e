//! Round-driving loop.
//!
//! A [`Simulation`] ties one [`CongestionController`] to one transport and
//! one observer, and runs rounds `1..=N` strictly in sequence:
//!
//! ```text
//!  handshake(N) ─▶ round 1 ─▶ round 2 ─▶ … ─▶ round N ─▶ close
//! ```
//!
//! The termination token only ends the round it arrives in; later rounds
//! still run. Any error aborts the whole run.
//!
//! The summary keeps one fixed-size [`RoundRecord`] per round. Per-packet
//! detail (ids, tokens, RTT samples) only flows through the observer.

use crate::controller::{CongestionController, RoundOutcome};
use crate::error::SimError;
use crate::mode::Mode;
use crate::packet::PacketId;
use crate::report::Observer;
use crate::state::WindowUpdate;
use crate::timer::RttSnapshot;
use crate::transport::Transport;

/// Counters kept for one finished round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRecord {
    pub round: u32,
    /// Window in force when the round started, i.e. packets sent.
    pub cwnd: u64,
    pub acks_received: usize,
    pub timed_out: Option<PacketId>,
    pub terminated: bool,
    pub update: WindowUpdate,
}

impl From<&RoundOutcome> for RoundRecord {
    fn from(outcome: &RoundOutcome) -> Self {
        Self {
            round: outcome.round,
            cwnd: outcome.packets_sent() as u64,
            acks_received: outcome.acks_received(),
            timed_out: outcome.timed_out,
            terminated: outcome.terminated,
            update: outcome.update,
        }
    }
}

/// Result of a complete run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    pub mode: Mode,
    pub rounds: Vec<RoundRecord>,
    pub final_cwnd: u64,
    pub final_ssthresh: u64,
    pub final_rtt: RttSnapshot,
}

impl SimulationSummary {
    pub fn timeouts(&self) -> usize {
        self.rounds.iter().filter(|r| r.timed_out.is_some()).count()
    }

    pub fn acks_received(&self) -> usize {
        self.rounds.iter().map(|r| r.acks_received).sum()
    }

    /// `cwnd` in force at the start of each round.
    pub fn cwnd_trajectory(&self) -> Vec<u64> {
        self.rounds.iter().map(|r| r.cwnd).collect()
    }
}

/// One run of the sender against one peer.
#[derive(Debug)]
pub struct Simulation<T, O> {
    controller: CongestionController,
    transport: T,
    observer: O,
}

impl<T: Transport, O: Observer> Simulation<T, O> {
    pub fn new(controller: CongestionController, transport: T, observer: O) -> Self {
        Self {
            controller,
            transport,
            observer,
        }
    }

    /// Run every round and close the transport.
    ///
    /// On error the transport is left as is; the caller owns teardown.
    pub async fn run(&mut self) -> Result<SimulationSummary, SimError> {
        let total_rounds = self.controller.total_rounds();
        self.observer.observe(&self.controller.configured_event());
        self.transport.handshake(total_rounds).await?;

        let mut rounds = Vec::new();
        for round in 1..=total_rounds {
            let outcome = self
                .controller
                .run_round(round, &mut self.transport, &mut self.observer)
                .await?;
            rounds.push(RoundRecord::from(&outcome));
        }

        self.transport.close().await?;
        log::info!(
            "[cc] finished {total_rounds} round(s): cwnd={} ssthresh={}",
            self.controller.cwnd(),
            self.controller.ssthresh()
        );

        Ok(SimulationSummary {
            mode: self.controller.mode(),
            rounds,
            final_cwnd: self.controller.cwnd(),
            final_ssthresh: self.controller.ssthresh(),
            final_rtt: self.controller.rtt(),
        })
    }

    pub fn controller(&self) -> &CongestionController {
        &self.controller
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_parts(self) -> (CongestionController, T, O) {
        (self.controller, self.transport, self.observer)
    }
}
