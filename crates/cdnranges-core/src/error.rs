//! Error types for cdnranges
//!
//! Only [`Error::Config`] and [`Error::Lifecycle`] ever reach a caller as hard
//! failures. Everything else is produced during a refresh cycle and is logged
//! by the scheduler instead of being surfaced to readers.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for cdnranges operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cdnranges
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed directive, duration, or out-of-range value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure while fetching a range list
    #[error("Failed to fetch IP ranges from {source_name}: {message}")]
    Fetch {
        /// Name of the source that failed
        source_name: String,
        /// Underlying error message
        message: String,
    },

    /// Fetch did not complete within the configured timeout
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Source answered with a non-success status code
    #[error("Unexpected status code from {source_name}: {status}")]
    Status {
        /// Name of the source that answered
        source_name: String,
        /// Numeric HTTP status code
        status: u16,
    },

    /// A single line could not be parsed as a CIDR expression
    #[error("Invalid IP range '{input}': {reason}")]
    InvalidPrefix {
        /// Offending input
        input: String,
        /// Parser error message
        reason: String,
    },

    /// Provision/cleanup called in the wrong state
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a fetch (transport) error
    pub fn fetch(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a status-code error
    pub fn status(source_name: impl Into<String>, status: u16) -> Self {
        Self::Status {
            source_name: source_name.into(),
            status,
        }
    }

    /// Create an invalid prefix error
    pub fn invalid_prefix(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPrefix {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a lifecycle error
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }

    /// Returns true for errors produced by a failed fetch attempt
    ///
    /// Transport, timeout and status errors are all treated the same way by the
    /// scheduler: logged, previous snapshot kept.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Timeout(_) | Self::Status { .. }
        )
    }
}
