//! The congestion-control state machine.
//!
//! A [`CongestionController`] owns every piece of sender state: the window
//! ([`CongestionWindow`]), the RTT estimator ([`RetransmitTimer`]) and the
//! mode. [`CongestionController::run_round`] drives exactly one round:
//!
//! 1. build a batch of `cwnd` packets and hand it to the transport;
//! 2. await one acknowledgement per packet, in send order, each bounded by
//!    the current adaptive timeout;
//! 3. apply the end-of-round reaction.
//!
//! | Round ended by     | Reaction                                           |
//! |--------------------|----------------------------------------------------|
//! | every packet acked | slow start (`cwnd *= 2`) or avoidance (`cwnd += 1`)|
//! | a timeout          | rewind to the lost packet, `ssthresh = cwnd / 2`,  |
//! |                    | `cwnd = 1`                                         |
//! | the `END` token    | none; the window is left as it was                 |
//!
//! Rounds run strictly one at a time; the controller is not meant to be
//! shared.

use tokio::time::Instant;

use crate::config::SimConfig;
use crate::error::SimError;
use crate::mode::Mode;
use crate::packet::PacketId;
use crate::report::{Observer, RoundEvent};
use crate::state::{Phase, WindowUpdate};
use crate::timer::{as_millis_f64, RetransmitTimer, RttSnapshot};
use crate::transport::{AckEvent, Shutdown, Transport};
use crate::window::CongestionWindow;

// ---------------------------------------------------------------------------
// RoundOutcome
// ---------------------------------------------------------------------------

/// An acknowledgement accepted during a round.
#[derive(Debug, Clone, PartialEq)]
pub struct AckRecord {
    /// The packet whose wait this acknowledgement ended.
    pub packet: PacketId,
    pub token: String,
    pub sample_rtt_ms: f64,
}

/// Summary of one completed round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub round: u32,
    pub sent: Vec<PacketId>,
    pub acks: Vec<AckRecord>,
    /// The packet whose wait ran out, if any.
    pub timed_out: Option<PacketId>,
    /// `true` when the termination token cut the round short.
    pub terminated: bool,
    pub update: WindowUpdate,
}

impl RoundOutcome {
    pub fn packets_sent(&self) -> usize {
        self.sent.len()
    }

    pub fn acks_received(&self) -> usize {
        self.acks.len()
    }

    pub fn timeout_occurred(&self) -> bool {
        self.timed_out.is_some()
    }
}

/// Controller state between rounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSnapshot {
    pub cwnd: u64,
    pub ssthresh: u64,
    pub next_seq: u64,
    pub rtt: RttSnapshot,
}

// ---------------------------------------------------------------------------
// CongestionController
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CongestionController {
    mode: Mode,
    total_rounds: u32,
    window: CongestionWindow,
    timer: RetransmitTimer,
    shutdown: Option<Shutdown>,
}

impl CongestionController {
    /// Validate operator input and build a controller with default seeds.
    ///
    /// Fails with [`SimError::InvalidConfig`] for an unknown mode or a
    /// non-positive round count.
    pub fn configure(mode: &str, total_rounds: i64) -> Result<Self, SimError> {
        Self::new(SimConfig::from_operator(mode, total_rounds)?)
    }

    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            mode: config.mode,
            total_rounds: config.total_rounds,
            window: CongestionWindow::new(config.initial_cwnd, config.initial_ssthresh),
            timer: RetransmitTimer::new(config.timer),
            shutdown: None,
        })
    }

    /// Abandon acknowledgement waits once `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn cwnd(&self) -> u64 {
        self.window.cwnd()
    }

    pub fn ssthresh(&self) -> u64 {
        self.window.ssthresh()
    }

    pub fn next_seq(&self) -> u64 {
        self.window.next_seq()
    }

    pub fn phase(&self) -> Phase {
        self.window.phase()
    }

    pub fn rtt(&self) -> RttSnapshot {
        self.timer.snapshot()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            cwnd: self.cwnd(),
            ssthresh: self.ssthresh(),
            next_seq: self.next_seq(),
            rtt: self.rtt(),
        }
    }

    /// The event announcing this configuration.
    pub fn configured_event(&self) -> RoundEvent {
        RoundEvent::Configured {
            mode: self.mode,
            total_rounds: self.total_rounds,
        }
    }

    /// Run round `round` (1-based, at most `total_rounds`) over `transport`.
    ///
    /// Timeouts and the termination token are ordinary outcomes; only
    /// transport failures and cancellation are errors, and both leave the
    /// controller mid-round.
    pub async fn run_round<T, O>(
        &mut self,
        round: u32,
        transport: &mut T,
        observer: &mut O,
    ) -> Result<RoundOutcome, SimError>
    where
        T: Transport,
        O: Observer,
    {
        if round == 0 || round > self.total_rounds {
            return Err(SimError::InvalidConfig(format!(
                "round {round} is outside 1..={}",
                self.total_rounds
            )));
        }

        observer.observe(&RoundEvent::RoundStarted {
            round,
            cwnd: self.cwnd(),
            ssthresh: self.ssthresh(),
            phase: self.phase(),
        });

        let batch = self.window.build_batch();
        transport.send(round, &batch).await?;
        observer.observe(&RoundEvent::Sent {
            round,
            packets: batch.clone(),
        });

        let mut acks = Vec::with_capacity(batch.len());
        let mut timed_out = None;
        let mut terminated = false;

        for &packet in &batch {
            let sent_at = Instant::now();
            match self.await_ack(transport).await? {
                AckEvent::Ack(token) => {
                    let sample_rtt_ms = as_millis_f64(sent_at.elapsed());
                    self.timer.record_rtt_sample(sample_rtt_ms);
                    observer.observe(&RoundEvent::AckReceived {
                        packet,
                        token: token.clone(),
                        sample_rtt_ms,
                        timeout_interval_ms: self.timer.timeout_interval_ms(),
                    });
                    acks.push(AckRecord {
                        packet,
                        token,
                        sample_rtt_ms,
                    });
                }
                AckEvent::End => {
                    terminated = true;
                    observer.observe(&RoundEvent::Terminated { round, packet });
                    break;
                }
                AckEvent::Timeout => {
                    timed_out = Some(packet);
                    observer.observe(&RoundEvent::TimedOut { packet });
                    break;
                }
            }
        }

        let update = match timed_out {
            Some(lost) => self.on_timeout(lost),
            None if terminated => self.window.on_terminated(),
            None => self.window.on_clean_round(),
        };
        log::debug!(
            "[cc] round={round} acked={}/{} {update}",
            acks.len(),
            batch.len()
        );
        observer.observe(&RoundEvent::WindowUpdated { round, update });

        Ok(RoundOutcome {
            round,
            sent: batch,
            acks,
            timed_out,
            terminated,
            update,
        })
    }

    fn on_timeout(&mut self, lost: PacketId) -> WindowUpdate {
        // Reno's fast recovery is not modelled; both variants collapse.
        match self.mode {
            Mode::Tahoe | Mode::Reno => self.window.on_timeout(lost),
        }
    }

    /// One bounded wait, raced against the shutdown signal when present.
    async fn await_ack<T: Transport>(&mut self, transport: &mut T) -> Result<AckEvent, SimError> {
        let deadline = self.timer.timeout();
        match self.shutdown.as_mut() {
            Some(shutdown) => tokio::select! {
                biased;
                _ = shutdown.triggered() => Err(SimError::Cancelled),
                event = transport.await_ack(deadline) => Ok(event?),
            },
            None => Ok(transport.await_ack(deadline).await?),
        }
    }
}
