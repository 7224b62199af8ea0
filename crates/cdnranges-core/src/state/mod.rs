// # State
//
// Holds the authoritative IP range list shared between the refresh task
// (sole writer) and request handlers (readers).

pub mod snapshot;

pub use snapshot::{Snapshot, SnapshotStore};
