//! Run configuration.
//!
//! There is no configuration file: values come from the operator prompts or
//! from command-line flags, and everything else has a fixed default.

use std::time::Duration;

use crate::error::SimError;
use crate::mode::Mode;
use crate::timer::TimerConfig;
use crate::window::{INITIAL_CWND, INITIAL_SSTHRESH};

/// Largest accepted round count.
pub const MAX_ROUNDS: u32 = 1_000_000;

/// Largest accepted starting timeout (`estimatedRTT + 4 · devRTT`), one day.
pub const MAX_INITIAL_TIMEOUT_MS: f64 = 86_400_000.0;

/// Parameters of one congestion-control run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub mode: Mode,
    /// Number of rounds to run; within `1..=MAX_ROUNDS` once validated.
    pub total_rounds: u32,
    pub initial_cwnd: u64,
    pub initial_ssthresh: u64,
    pub timer: TimerConfig,
}

impl SimConfig {
    /// Build a validated configuration with default window and timer seeds.
    pub fn new(mode: Mode, total_rounds: i64) -> Result<Self, SimError> {
        if total_rounds <= 0 {
            return Err(SimError::InvalidConfig(format!(
                "round count must be positive, got {total_rounds}"
            )));
        }
        let total_rounds = u32::try_from(total_rounds)
            .ok()
            .filter(|&n| n <= MAX_ROUNDS)
            .ok_or_else(|| {
                SimError::InvalidConfig(format!(
                    "round count {total_rounds} exceeds the maximum of {MAX_ROUNDS}"
                ))
            })?;
        let config = Self {
            mode,
            total_rounds,
            initial_cwnd: INITIAL_CWND,
            initial_ssthresh: INITIAL_SSTHRESH,
            timer: TimerConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Like [`SimConfig::new`], parsing the mode from operator text.
    pub fn from_operator(mode: &str, total_rounds: i64) -> Result<Self, SimError> {
        Self::new(mode.parse()?, total_rounds)
    }

    /// Check invariants on a hand-assembled configuration.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.total_rounds == 0 {
            return Err(SimError::InvalidConfig("round count must be positive".into()));
        }
        if self.total_rounds > MAX_ROUNDS {
            return Err(SimError::InvalidConfig(format!(
                "round count {} exceeds the maximum of {MAX_ROUNDS}",
                self.total_rounds
            )));
        }
        if self.initial_cwnd == 0 {
            return Err(SimError::InvalidConfig("initial cwnd must be at least 1".into()));
        }
        let TimerConfig {
            initial_rtt_ms,
            initial_dev_ms,
        } = self.timer;
        if !(initial_rtt_ms.is_finite() && initial_rtt_ms >= 0.0)
            || !(initial_dev_ms.is_finite() && initial_dev_ms >= 0.0)
        {
            return Err(SimError::InvalidConfig(
                "initial RTT estimates must be finite and non-negative".into(),
            ));
        }
        if initial_rtt_ms + 4.0 * initial_dev_ms > MAX_INITIAL_TIMEOUT_MS {
            return Err(SimError::InvalidConfig(format!(
                "initial timeout {} ms exceeds {MAX_INITIAL_TIMEOUT_MS} ms",
                initial_rtt_ms + 4.0 * initial_dev_ms
            )));
        }
        Ok(())
    }
}

/// Fault model applied by the simulated link and the bundled peer.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultConfig {
    /// Probability in `[0, 1]` that a packet is lost. The receiver is
    /// cumulative, so a loss silences the rest of its batch.
    pub loss_rate: f64,
    /// Lower bound of the per-packet acknowledgement delay.
    pub min_delay: Duration,
    /// Upper bound of the per-packet acknowledgement delay.
    pub max_delay: Duration,
    /// Fixed RNG seed for reproducible runs; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Number of packets in the simulated transfer. Packets beyond it are
    /// answered with the termination token.
    pub transfer_size: Option<u64>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        // No loss by default; delays well under the initial 1.5 s timeout.
        Self {
            loss_rate: 0.0,
            min_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(80),
            seed: None,
            transfer_size: None,
        }
    }
}

impl FaultConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(SimError::InvalidConfig(format!(
                "loss rate must be within [0, 1], got {}",
                self.loss_rate
            )));
        }
        if self.min_delay > self.max_delay {
            return Err(SimError::InvalidConfig(format!(
                "min delay {:?} exceeds max delay {:?}",
                self.min_delay, self.max_delay
            )));
        }
        if self.transfer_size == Some(0) {
            return Err(SimError::InvalidConfig("transfer size must be positive".into()));
        }
        Ok(())
    }
}
