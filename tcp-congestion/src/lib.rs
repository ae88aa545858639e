//! `tcp-congestion`: a round-based TCP Tahoe/Reno sender simulator.
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────────┐  RoundEvents   ┌──────────────┐
//!  │  Controller   │───────────────▶│   Observer   │  (console / log)
//!  │ cwnd ssthresh │                └──────────────┘
//!  │ RTT estimator │
//!  └──────┬────────┘
//!         │ send(round, ids) / await_ack(deadline)
//!  ┌──────▼────────────────────────────┐
//!  │             Transport             │
//!  │  TcpTransport │ SimulatedLink │ … │
//!  └──────┬────────────────────────────┘
//!         │ line-oriented text
//!  ┌──────▼──────┐
//!  │    Peer     │  (remote, or the bundled fault-injecting one)
//!  └─────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`controller`]: per-round congestion-control state machine
//! - [`window`]: cwnd / ssthresh / next-sequence bookkeeping
//! - [`timer`]: RTT estimation and the adaptive timeout
//! - [`state`]: growth phases and window decisions
//! - [`transport`]: transport trait, TCP transport, shutdown signal
//! - [`packet`]: line-oriented wire format
//! - [`simulator`]: in-process fault-injecting and scripted transports
//! - [`session`]: the round-driving loop
//! - [`report`]: progress events and their observers
//! - [`prompt`]: operator input
//! - [`peer`]: bundled acknowledging peer server
//! - [`config`], [`mode`], [`error`]: run parameters and failures

pub mod config;
pub mod controller;
pub mod error;
pub mod mode;
pub mod packet;
pub mod peer;
pub mod prompt;
pub mod report;
pub mod session;
pub mod simulator;
pub mod state;
pub mod timer;
pub mod transport;
pub mod window;

pub use config::{FaultConfig, SimConfig};
pub use controller::{CongestionController, RoundOutcome};
pub use error::SimError;
pub use mode::Mode;
pub use session::{RoundRecord, Simulation, SimulationSummary};
pub use transport::{AckEvent, Transport, TransportError};
