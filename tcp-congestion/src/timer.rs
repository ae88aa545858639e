//! RTT estimation and the adaptive acknowledgement timeout.
//!
//! Every received acknowledgement yields one RTT sample, which is folded into
//! an exponentially weighted moving average (Jacobson's algorithm):
//!
//! ```text
//!   estimatedRTT    = 7/8 · estimatedRTT + 1/8 · sample
//!   devRTT          = 3/4 · devRTT       + 1/4 · |sample − estimatedRTT|
//!   timeoutInterval = estimatedRTT + 4 · devRTT
//! ```
//!
//! `devRTT` is computed against the *already updated* `estimatedRTT`, and the
//! timeout is recomputed after both. All values are milliseconds kept at full
//! `f64` precision; rounding is left to whoever displays them.
//!
//! Unlike RFC 6298 there is no first-sample special case and no exponential
//! back-off: the estimator is seeded from [`TimerConfig`] and the timeout is
//! only ever changed by a sample.

use std::time::Duration;

const ALPHA: f64 = 0.125;
const BETA: f64 = 0.25;
const DEV_MULTIPLIER: f64 = 4.0;

/// Starting estimator values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerConfig {
    /// Initial `estimatedRTT` in milliseconds.
    pub initial_rtt_ms: f64,
    /// Initial `devRTT` in milliseconds.
    pub initial_dev_ms: f64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            initial_rtt_ms: 500.0,
            initial_dev_ms: 250.0,
        }
    }
}

/// Point-in-time copy of the estimator, for reports and summaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttSnapshot {
    pub estimated_rtt_ms: f64,
    pub dev_rtt_ms: f64,
    pub timeout_interval_ms: f64,
}

/// The running RTT estimator owned by one controller.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    estimated_rtt_ms: f64,
    dev_rtt_ms: f64,
    timeout_interval_ms: f64,
}

impl Default for RetransmitTimer {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

impl RetransmitTimer {
    pub fn new(config: TimerConfig) -> Self {
        let mut timer = Self {
            estimated_rtt_ms: config.initial_rtt_ms,
            dev_rtt_ms: config.initial_dev_ms,
            timeout_interval_ms: 0.0,
        };
        timer.recompute_timeout();
        timer
    }

    /// Fold one RTT sample (milliseconds) into the estimator.
    pub fn record_rtt_sample(&mut self, sample_ms: f64) {
        self.estimated_rtt_ms = (1.0 - ALPHA) * self.estimated_rtt_ms + ALPHA * sample_ms;
        self.dev_rtt_ms =
            (1.0 - BETA) * self.dev_rtt_ms + BETA * (sample_ms - self.estimated_rtt_ms).abs();
        self.recompute_timeout();
    }

    fn recompute_timeout(&mut self) {
        self.timeout_interval_ms = self.estimated_rtt_ms + DEV_MULTIPLIER * self.dev_rtt_ms;
    }

    pub fn estimated_rtt_ms(&self) -> f64 {
        self.estimated_rtt_ms
    }

    pub fn dev_rtt_ms(&self) -> f64 {
        self.dev_rtt_ms
    }

    pub fn timeout_interval_ms(&self) -> f64 {
        self.timeout_interval_ms
    }

    /// The current timeout as a wait deadline, saturating at `Duration::MAX`.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_interval_ms.max(0.0) / 1000.0)
            .unwrap_or(Duration::MAX)
    }

    pub fn snapshot(&self) -> RttSnapshot {
        RttSnapshot {
            estimated_rtt_ms: self.estimated_rtt_ms,
            dev_rtt_ms: self.dev_rtt_ms,
            timeout_interval_ms: self.timeout_interval_ms,
        }
    }
}

/// Convert an elapsed wall-clock duration to fractional milliseconds.
pub fn as_millis_f64(elapsed: Duration) -> f64 {
    elapsed.as_nanos() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn initial_timeout_is_derived_from_seed() {
        let t = RetransmitTimer::default();
        assert!(close(t.estimated_rtt_ms(), 500.0));
        assert!(close(t.dev_rtt_ms(), 250.0));
        assert!(close(t.timeout_interval_ms(), 1500.0));
        assert_eq!(t.timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn dev_uses_updated_estimate() {
        let mut t = RetransmitTimer::default();
        t.record_rtt_sample(100.0);
        // estimated = 437.5 + 12.5; dev = 187.5 + 0.25 * |100 - 450|
        assert!(close(t.estimated_rtt_ms(), 450.0));
        assert!(close(t.dev_rtt_ms(), 275.0));
        assert!(close(t.timeout_interval_ms(), 1550.0));
    }

    #[test]
    fn dev_against_stale_estimate_would_differ() {
        let mut t = RetransmitTimer::default();
        t.record_rtt_sample(100.0);
        let stale_dev = 0.75 * 250.0 + 0.25 * (100.0_f64 - 500.0).abs();
        assert!(!close(t.dev_rtt_ms(), stale_dev));
    }

    #[test]
    fn timeout_tracks_every_sample() {
        let mut t = RetransmitTimer::new(TimerConfig {
            initial_rtt_ms: 100.0,
            initial_dev_ms: 0.0,
        });
        let initial = t.timeout_interval_ms();
        for _ in 0..60 {
            t.record_rtt_sample(20.0);
            let now = t.timeout_interval_ms();
            assert!(close(now, t.estimated_rtt_ms() + 4.0 * t.dev_rtt_ms()));
        }
        assert!(t.timeout_interval_ms() < initial);
    }

    #[test]
    fn steady_samples_converge() {
        let mut t = RetransmitTimer::default();
        for _ in 0..400 {
            t.record_rtt_sample(40.0);
        }
        assert!((t.estimated_rtt_ms() - 40.0).abs() < 1e-6);
        assert!(t.dev_rtt_ms() < 1e-6);
    }

    #[test]
    fn oversized_timeout_saturates() {
        let t = RetransmitTimer::new(TimerConfig {
            initial_rtt_ms: 1e30,
            initial_dev_ms: 0.0,
        });
        assert_eq!(t.timeout(), Duration::MAX);

        let t = RetransmitTimer::new(TimerConfig {
            initial_rtt_ms: f64::INFINITY,
            initial_dev_ms: 0.0,
        });
        assert_eq!(t.timeout(), Duration::MAX);
    }

    #[test]
    fn fractional_millis() {
        assert!(close(as_millis_f64(Duration::from_micros(1500)), 1.5));
        assert!(close(as_millis_f64(Duration::from_millis(100)), 100.0));
    }
}
