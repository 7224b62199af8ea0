// # Snapshot Store
//
// In-memory holder of the current IP range list.
//
// ## Consistency
//
// - A snapshot is immutable once built; writers publish a whole new one
// - `replace` is a single pointer swap, readers see the old list or the new
//   list and never anything in between
// - Reads never take a lock, so request handlers are never held up by a
//   refresh in progress
//
// ## Crash Behavior
//
// Nothing is persisted. After a restart the store is empty until the first
// successful refresh.

use std::ops::Deref;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use ipnet::IpNet;
use tracing::debug;

/// One complete, published IP range list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    prefixes: Vec<IpNet>,
    fetched_at: Option<DateTime<Utc>>,
    source: Option<String>,
}

impl Snapshot {
    /// Build a snapshot from a freshly fetched list
    pub fn new(prefixes: Vec<IpNet>, source: impl Into<String>) -> Self {
        Self {
            prefixes,
            fetched_at: Some(Utc::now()),
            source: Some(source.into()),
        }
    }

    /// The initial snapshot, before any refresh succeeded
    pub fn empty() -> Self {
        Self::default()
    }

    /// The prefixes, in source order
    pub fn prefixes(&self) -> &[IpNet] {
        &self.prefixes
    }

    /// When the list was fetched (`None` for the initial snapshot)
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Name of the source the list came from
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

impl Deref for Snapshot {
    type Target = [IpNet];

    fn deref(&self) -> &Self::Target {
        &self.prefixes
    }
}

/// Shared store for the current [`Snapshot`]
///
/// Cloning is cheap and every clone refers to the same underlying list.
///
/// # Example
///
/// ```rust
/// use cdnranges_core::state::{Snapshot, SnapshotStore};
///
/// let store = SnapshotStore::new();
/// assert!(store.read().is_empty());
///
/// store.replace(Snapshot::new(vec!["1.2.3.0/24".parse().unwrap()], "parspack"));
/// assert_eq!(store.read().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    current: Arc<ArcSwap<Snapshot>>,
}

impl SnapshotStore {
    /// Create a store holding the empty snapshot
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(Snapshot::empty())),
        }
    }

    /// Return the current snapshot
    pub fn read(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Install a new snapshot, visible to all subsequent reads
    pub fn replace(&self, snapshot: Snapshot) {
        debug!(count = snapshot.len(), "replacing IP range snapshot");
        self.current.store(Arc::new(snapshot));
    }

    /// Number of prefixes in the current snapshot
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    /// Check if the current snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// When the current snapshot was fetched
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.current.load().fetched_at()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
