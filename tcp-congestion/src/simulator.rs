//! In-process network models.
//!
//! Real peers delay and drop acknowledgements. To exercise the congestion
//! reactions without a network, this module provides:
//!
//! | Type                  | Use                                                  |
//! |-----------------------|------------------------------------------------------|
//! | [`FaultModel`]        | Seeded loss/delay/termination planner, shared with   |
//! |                       | the bundled peer server.                             |
//! | [`SimulatedLink`]     | A [`Transport`] whose peer is the fault model.       |
//! | [`ScriptedTransport`] | A [`Transport`] that replays a fixed list of replies |
//! |                       | for deterministic tests.                             |
//!
//! Delays are driven by tokio's clock, so tests running with a paused clock
//! see exact, reproducible RTT samples.

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant};

use crate::config::FaultConfig;
use crate::packet::{Batch, PacketId, Reply};
use crate::transport::{AckEvent, Transport, TransportError};

// ---------------------------------------------------------------------------
// FaultModel
// ---------------------------------------------------------------------------

/// One reply the peer will emit, `after` the batch arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedReply {
    pub after: Duration,
    pub reply: Reply,
}

/// Decides, per batch, which acknowledgements a cumulative receiver emits
/// and when.
#[derive(Debug)]
pub struct FaultModel {
    config: FaultConfig,
    rng: StdRng,
}

impl FaultModel {
    pub fn new(config: FaultConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    /// Plan the replies to `ids`, in order.
    ///
    /// Each reply is delayed by a uniform draw from the configured range,
    /// measured from the previous reply. The first lost packet ends the
    /// plan, as does the first packet past the transfer size (which is
    /// answered with the termination token).
    pub fn plan(&mut self, ids: &[PacketId]) -> Vec<PlannedReply> {
        let mut plan = Vec::with_capacity(ids.len());
        let mut at = Duration::ZERO;
        for &id in ids {
            at += self.draw_delay();
            if self.config.transfer_size.is_some_and(|size| id.seq() > size) {
                plan.push(PlannedReply {
                    after: at,
                    reply: Reply::End,
                });
                break;
            }
            if self.config.loss_rate > 0.0 && self.rng.random_bool(self.config.loss_rate) {
                log::debug!("[link] dropping {id} and the rest of its batch");
                break;
            }
            plan.push(PlannedReply {
                after: at,
                reply: Reply::ack_for(id),
            });
        }
        plan
    }

    fn draw_delay(&mut self) -> Duration {
        let FaultConfig {
            min_delay,
            max_delay,
            ..
        } = self.config;
        if min_delay >= max_delay {
            min_delay
        } else {
            self.rng.random_range(min_delay..=max_delay)
        }
    }
}

// ---------------------------------------------------------------------------
// SimulatedLink
// ---------------------------------------------------------------------------

/// A transport whose far end is a [`FaultModel`] running in background tasks.
///
/// Replies for a batch are delivered by a spawned task, so acknowledgements
/// that outlive the sender's timeout still arrive later, just as stale ACKs
/// do on a real connection.
#[derive(Debug)]
pub struct SimulatedLink {
    faults: FaultModel,
    reply_tx: mpsc::UnboundedSender<Reply>,
    reply_rx: mpsc::UnboundedReceiver<Reply>,
    in_flight: Vec<JoinHandle<()>>,
}

impl SimulatedLink {
    pub fn new(config: FaultConfig) -> Self {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        Self {
            faults: FaultModel::new(config),
            reply_tx,
            reply_rx,
            in_flight: Vec::new(),
        }
    }
}

impl Transport for SimulatedLink {
    async fn handshake(&mut self, total_rounds: u32) -> Result<(), TransportError> {
        log::debug!("[link] simulated peer expects {total_rounds} round(s)");
        Ok(())
    }

    async fn send(&mut self, round: u32, ids: &[PacketId]) -> Result<(), TransportError> {
        let plan = self.faults.plan(ids);
        log::debug!(
            "[link] round={round} sent={} replies planned={}",
            ids.len(),
            plan.len()
        );
        self.in_flight.retain(|task| !task.is_finished());

        let tx = self.reply_tx.clone();
        let start = Instant::now();
        self.in_flight.push(tokio::spawn(async move {
            for planned in plan {
                sleep_until(start + planned.after).await;
                if tx.send(planned.reply).is_err() {
                    return;
                }
            }
        }));
        Ok(())
    }

    async fn await_ack(&mut self, deadline: Duration) -> Result<AckEvent, TransportError> {
        match timeout(deadline, self.reply_rx.recv()).await {
            Err(_elapsed) => Ok(AckEvent::Timeout),
            Ok(Some(reply)) => Ok(reply.into()),
            Ok(None) => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        for task in self.in_flight.drain(..) {
            task.abort();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// What the scripted peer does during one acknowledgement wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Reply `token` after `after`; a wait shorter than that times out and
    /// the reply is lost.
    Ack { after: Duration, token: String },
    /// Reply with the termination token after `after`.
    End { after: Duration },
    /// Never reply.
    Silence,
    /// The connection drops: the wait fails with [`TransportError::Closed`].
    Fail,
}

/// Deterministic transport that replays one [`Step`] per wait and records
/// everything the sender transmits. Once the script runs out every wait
/// times out.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: VecDeque<Step>,
    acks_scripted: u64,
    /// Round count received through the handshake.
    pub handshake: Option<u32>,
    /// Every batch sent, in order.
    pub sent: Vec<Batch>,
    pub closed: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an acknowledgement arriving `after_ms` into the wait.
    pub fn ack(mut self, after_ms: u64) -> Self {
        self.acks_scripted += 1;
        self.steps.push_back(Step::Ack {
            after: Duration::from_millis(after_ms),
            token: format!("ACK{}", self.acks_scripted),
        });
        self
    }

    /// Append `count` acknowledgements, each arriving `after_ms` into its wait.
    pub fn acks(self, count: usize, after_ms: u64) -> Self {
        (0..count).fold(self, |script, _| script.ack(after_ms))
    }

    pub fn end(mut self, after_ms: u64) -> Self {
        self.steps.push_back(Step::End {
            after: Duration::from_millis(after_ms),
        });
        self
    }

    pub fn silence(mut self) -> Self {
        self.steps.push_back(Step::Silence);
        self
    }

    pub fn fail(mut self) -> Self {
        self.steps.push_back(Step::Fail);
        self
    }

    /// Steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl Transport for ScriptedTransport {
    async fn handshake(&mut self, total_rounds: u32) -> Result<(), TransportError> {
        self.handshake = Some(total_rounds);
        Ok(())
    }

    async fn send(&mut self, round: u32, ids: &[PacketId]) -> Result<(), TransportError> {
        self.sent.push(Batch {
            round,
            ids: ids.to_vec(),
        });
        Ok(())
    }

    async fn await_ack(&mut self, deadline: Duration) -> Result<AckEvent, TransportError> {
        let (after, event) = match self.steps.pop_front().unwrap_or(Step::Silence) {
            Step::Ack { after, token } => (after, AckEvent::Ack(token)),
            Step::End { after } => (after, AckEvent::End),
            Step::Silence => {
                sleep(deadline).await;
                return Ok(AckEvent::Timeout);
            }
            Step::Fail => return Err(TransportError::Closed),
        };
        match timeout(deadline, sleep(after)).await {
            Ok(()) => Ok(event),
            Err(_elapsed) => Ok(AckEvent::Timeout),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}
