//! Configuration types for cdnranges
//!
//! A [`RefreshConfig`] arrives either from the block syntax in
//! [`block`], from JSON, or is built directly. Zero values mean "unset":
//! [`RefreshConfig::with_defaults`] fills the interval, and a zero timeout
//! means fetches are not time-bounded.

pub mod block;
pub mod duration;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use duration::serde_duration;

pub use block::parse_block;
pub use duration::parse_duration;

/// Refresh interval used when none is configured
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Refresh settings for one range source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshConfig {
    /// Time between refresh cycles (zero = [`DEFAULT_INTERVAL`])
    #[serde(default, with = "serde_duration", skip_serializing_if = "Duration::is_zero")]
    pub interval: Duration,

    /// Upper bound for a single fetch (zero = no timeout)
    #[serde(default, with = "serde_duration", skip_serializing_if = "Duration::is_zero")]
    pub timeout: Duration,
}

impl RefreshConfig {
    /// Create a configuration with every field unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the refresh interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the fetch timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fill unset fields with their defaults
    pub fn with_defaults(mut self) -> Self {
        if self.interval.is_zero() {
            self.interval = DEFAULT_INTERVAL;
        }
        self
    }

    /// Validate the configuration
    ///
    /// Expects defaults to have been applied already.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::config("refresh interval must be > 0"));
        }
        Ok(())
    }

    /// The fetch timeout, or `None` when fetches may wait indefinitely
    pub fn timeout_limit(&self) -> Option<Duration> {
        if self.timeout.is_zero() {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Parse the block syntax (see [`block`])
    pub fn from_block(input: &str) -> Result<Self> {
        parse_block(input)
    }

    /// Read and parse a block-syntax configuration file
    pub fn from_block_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        parse_block(&contents)
    }

    /// Parse the JSON form, e.g. `{"interval": "2h", "timeout": 30000000000}`
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| Error::config(format!("invalid JSON config: {}", e)))
    }
}
