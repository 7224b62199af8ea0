// # Range Source Trait
//
// Defines the interface for retrieving a published IP range list.
//
// ## Implementations
//
// - HTTP(S) text endpoint: `cdnranges-http` crate
// - Test doubles: `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use cdnranges_core::RangeSource;
// use std::time::Duration;
//
// let source = /* RangeSource implementation */;
// let body = source.fetch(Some(Duration::from_secs(30))).await?;
// let prefixes = cdnranges_core::parser::parse_prefixes(&body);
// ```

use std::time::Duration;

use async_trait::async_trait;

/// Trait for range source implementations
///
/// A source performs exactly one retrieval per [`fetch`](RangeSource::fetch)
/// call and returns the raw body. Parsing, scheduling and storage are owned by
/// the scheduler.
///
/// ## Rules
///
/// - One request per call, no retries (the next tick is the retry)
/// - No background tasks
/// - No caching between calls
/// - When `timeout` is `Some`, the whole attempt (connect + full body) must be
///   bounded by it and fail with [`Error::Timeout`](crate::Error::Timeout)
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Fetch the raw range list
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The full response body
    /// - `Err(Error::Fetch)`: Transport failure
    /// - `Err(Error::Timeout)`: The attempt exceeded `timeout`
    /// - `Err(Error::Status)`: Non-success status code
    async fn fetch(&self, timeout: Option<Duration>) -> Result<String, crate::Error>;

    /// Short name used in logs and snapshots (e.g. "parspack")
    fn name(&self) -> &str;
}
