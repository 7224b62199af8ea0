// # cdnranges-core
//
// Core library for keeping a CDN's published IP ranges fresh in memory.
//
// ## Architecture Overview
//
// - **parser**: Turns a plain-text range list into `IpNet` prefixes
// - **RangeSource**: Trait for retrieving the raw range list (HTTP lives in
//   `cdnranges-http`)
// - **SnapshotStore**: Lock-free published snapshot, many readers, one writer
// - **RefreshScheduler**: Background loop, fetch on start and every interval
// - **CdnRanges**: Lifecycle controller (provision / cleanup / read)
//
// ## Design Principles
//
// 1. **Availability over freshness**: a failed refresh keeps the previous list
// 2. **Atomic publication**: readers see a whole list or the previous one
// 3. **Tolerant parsing**: a bad line is logged and skipped
// 4. **Library-First**: hosts embed `CdnRanges`; the daemon is thin glue

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod parser;
pub mod scheduler;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::RefreshConfig;
pub use error::{Error, Result};
pub use lifecycle::{CdnRanges, LifecycleState};
pub use scheduler::{RefreshEvent, RefreshScheduler};
pub use state::{Snapshot, SnapshotStore};
pub use traits::RangeSource;

pub use ipnet::IpNet;
