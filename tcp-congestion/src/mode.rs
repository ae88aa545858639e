//! Congestion-control variant selector.
//!
//! Both variants currently react identically to a timeout; the mode is kept
//! for labelling and as the branch point for variant-specific reactions.

use std::fmt;

use crate::error::SimError;

/// The TCP variant the sender emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// TCP Tahoe: every loss collapses the window back to one segment.
    #[default]
    Tahoe,
    /// TCP Reno. Fast retransmit / fast recovery is not modelled.
    Reno,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Tahoe => "TAHOE",
            Mode::Reno => "RENO",
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TAHOE" => Ok(Mode::Tahoe),
            "RENO" => Ok(Mode::Reno),
            other => Err(SimError::InvalidConfig(format!(
                "unknown mode {other:?} (expected TAHOE or RENO)"
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
