// # HTTP Range Source
//
// This crate provides the HTTP(S) range source for cdnranges.
//
// ## Purpose
//
// CDNs publish their edge ranges as a plain-text file, one CIDR expression
// per line. This source downloads that file; parsing and scheduling are done
// by `cdnranges-core`.
//
// ## Behavior
//
// - Exactly one GET per `fetch` call, no retries
// - The per-call timeout bounds connect + full body read
// - Anything other than `200 OK` is reported with its status code
// - No idle connections are kept between calls

use std::time::Duration;

use async_trait::async_trait;
use cdnranges_core::{Error, RangeSource, Result};
use serde::{Deserialize, Serialize};

/// ParsPack's published IPv4 edge ranges
pub const PARSPACK_IPV4_URL: &str = "https://parspack.com/cdnips.txt";

/// Source name used when none is configured
pub const DEFAULT_SOURCE_NAME: &str = "parspack";

/// User-Agent sent with every request
pub const USER_AGENT: &str = concat!("cdnranges/", env!("CARGO_PKG_VERSION"));

/// Configuration for an [`HttpRangeSource`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSourceConfig {
    /// URL of the plain-text range list
    #[serde(default = "default_url")]
    pub url: String,

    /// Name used in logs and snapshots
    #[serde(default = "default_name")]
    pub name: String,
}

fn default_url() -> String {
    PARSPACK_IPV4_URL.to_string()
}

fn default_name() -> String {
    DEFAULT_SOURCE_NAME.to_string()
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            name: default_name(),
        }
    }
}

impl HttpSourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::config("range source URL cannot be empty"));
        }
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(Error::config(format!(
                "range source URL must use http or https: {}",
                self.url
            )));
        }
        if self.name.is_empty() {
            return Err(Error::config("range source name cannot be empty"));
        }
        Ok(())
    }
}

/// Fetches a range list over HTTP(S)
pub struct HttpRangeSource {
    /// Name used in logs and errors
    name: String,

    /// URL to fetch the list from
    url: String,

    /// HTTP client (no client-wide timeout, it is applied per request)
    client: reqwest::Client,
}

impl HttpRangeSource {
    /// Create a source for `url`
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_name(DEFAULT_SOURCE_NAME, url)
    }

    /// Create a source with a custom name
    ///
    /// # Errors
    ///
    /// - `Error::Config`: The HTTP client could not be built (e.g. TLS backend
    ///   failed to initialize)
    pub fn with_name(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            url: url.into(),
            client,
        })
    }

    /// Source for ParsPack's published IPv4 ranges
    pub fn parspack() -> Result<Self> {
        Self::new(PARSPACK_IPV4_URL)
    }

    /// Create a source from validated configuration
    pub fn from_config(config: &HttpSourceConfig) -> Result<Self> {
        config.validate()?;
        Self::with_name(config.name.clone(), config.url.clone())
    }

    /// The URL this source fetches
    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_error(&self, err: reqwest::Error, timeout: Option<Duration>) -> Error {
        match timeout {
            Some(limit) if err.is_timeout() => Error::Timeout(limit),
            _ => Error::fetch(&self.name, err.to_string()),
        }
    }
}

#[async_trait]
impl RangeSource for HttpRangeSource {
    async fn fetch(&self, timeout: Option<Duration>) -> Result<String> {
        tracing::debug!(source = %self.name, url = %self.url, "fetching IP ranges");

        let mut request = self.client.get(&self.url);
        if let Some(limit) = timeout {
            request = request.timeout(limit);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.request_error(e, timeout))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::status(&self.name, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| self.request_error(e, timeout))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
