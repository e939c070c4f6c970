//! Error types for clawinn-core.

use thiserror::Error;

/// Errors returned by a [`MarketStore`](crate::MarketStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind (agent, negotiation, task).
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A debit would take a balance below zero.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount required for the operation.
        required: u64,
        /// Amount currently available.
        available: u64,
    },

    /// The requested state change is not allowed.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Snapshot could not be read or written.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl StoreError {
    /// Shorthand for a missing agent.
    pub fn agent_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "agent",
            id: id.to_string(),
        }
    }

    /// Returns true if retrying later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read or written.
    #[error("config io error at '{path}': {source}")]
    Io {
        /// Path of the config file.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`SimConfig`](crate::SimConfig).
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside its allowed range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Failures of a text generation backend.
///
/// These never leave the content provider; they only select the fallback text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// Backend is not configured or not reachable.
    #[error("text backend unavailable: {0}")]
    Unavailable(String),

    /// Local request or token budget exhausted.
    #[error("rate limited")]
    RateLimited,

    /// Backend returned something unusable.
    #[error("malformed completion: {0}")]
    Malformed(String),

    /// Backend did not answer in time.
    #[error("generation timed out after {0} ms")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_message() {
        let err = StoreError::InsufficientFunds {
            required: 150,
            available: 100,
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: required 150, available 100"
        );
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(StoreError::Unavailable("down".into()).is_transient());
        assert!(!StoreError::Conflict("dup".into()).is_transient());
        assert!(!StoreError::agent_not_found("a1").is_transient());
    }

    #[test]
    fn not_found_names_the_kind() {
        let err = StoreError::agent_not_found("abc");
        assert_eq!(err.to_string(), "agent not found: abc");
    }
}
