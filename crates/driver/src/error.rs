//! Error types for the per-date driver and the session manager.

use simdrive_core::DriverError;
use thiserror::Error;

/// Why a single attempt at simulating a date did not produce an outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// A required reading came back empty or a post-entry step failed; the
    /// whole date should be reloaded and run again.
    #[error("transient state fault: {0}")]
    Transient(String),

    /// The date cannot be simulated in this run.
    #[error("{0}")]
    Fatal(String),

    /// The remote session failed underneath the driver.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

impl SimulationError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient(reason.into())
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal(reason.into())
    }

    /// Returns true if the date should be restarted from the top.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Failures while establishing or persisting the remote session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("login did not succeed after {attempts} attempts: {last_failure}")]
    AttemptsExhausted { attempts: u32, last_failure: String },

    #[error("session store error: {0}")]
    Store(String),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}
