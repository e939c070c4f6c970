//! Error types for clawinn-sim.

use clawinn_core::{ConfigError, StoreError};
use thiserror::Error;

/// Errors raised inside the simulation.
///
/// None of these stop the scheduler; a phase returning one is logged and
/// skipped for the tick.
#[derive(Debug, Error)]
pub enum SimError {
    /// The persistence store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration was rejected.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A tick phase panicked.
    #[error("phase '{phase}' panicked: {message}")]
    PhasePanicked {
        /// Name of the phase.
        phase: &'static str,
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl SimError {
    /// Returns true if retrying on a later tick may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Config(_) | Self::PhasePanicked { .. } => false,
        }
    }
}
