//! Error taxonomy for a simulation run.
//!
//! A timeout while waiting for an acknowledgement is *not* an error; it is
//! reported as [`crate::transport::AckEvent::Timeout`] and drives the
//! congestion reaction. Everything here is fatal to the current run.

use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum SimError {
    /// Bad mode string or non-positive round count. The run never starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The connection to the peer dropped or an I/O call failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The operator console could not be read or written.
    #[error("operator console I/O error: {0}")]
    Input(#[source] std::io::Error),

    /// A shutdown signal interrupted an acknowledgement wait.
    #[error("simulation cancelled")]
    Cancelled,
}
