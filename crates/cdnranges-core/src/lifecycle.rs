//! Lifecycle controller
//!
//! [`CdnRanges`] is the adapter a host plugs into: it is provisioned once,
//! serves reads for as long as the host likes, and is cleaned up once.
//!
//! ```text
//! Uninitialized ──provision──▶ Running ──cleanup──▶ Stopped
//! ```
//!
//! `cleanup` is safe to call in any state, any number of times.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RefreshConfig;
use crate::error::{Error, Result};
use crate::scheduler::{RefreshEvent, RefreshScheduler};
use crate::state::{Snapshot, SnapshotStore};
use crate::traits::RangeSource;

/// Default capacity of the refresh event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle state of a [`CdnRanges`] instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, not yet provisioned
    Uninitialized,
    /// Background refresh running
    Running,
    /// Cleaned up; cannot be restarted
    Stopped,
}

struct Inner {
    state: LifecycleState,
    config: Option<RefreshConfig>,
    event_tx: Option<mpsc::Sender<RefreshEvent>>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Keeps the IP ranges of one source fresh and serves them to readers
///
/// # Example
///
/// ```rust,ignore
/// use cdnranges_core::{CdnRanges, RefreshConfig};
/// use std::sync::Arc;
///
/// let (ranges, _events) = CdnRanges::new(Arc::new(source));
/// ranges.provision(RefreshConfig::from_block("parspack { interval 2h }")?)?;
///
/// // In request handlers:
/// let trusted = ranges.ip_ranges();
///
/// ranges.cleanup()?;
/// ```
pub struct CdnRanges {
    source: Arc<dyn RangeSource>,
    store: SnapshotStore,
    inner: Mutex<Inner>,
}

impl CdnRanges {
    /// Create an unprovisioned instance
    ///
    /// # Returns
    ///
    /// A tuple of (instance, event_receiver). The receiver may be dropped if
    /// events are not needed.
    pub fn new(source: Arc<dyn RangeSource>) -> (Self, mpsc::Receiver<RefreshEvent>) {
        Self::with_event_capacity(source, DEFAULT_EVENT_CHANNEL_CAPACITY)
    }

    /// Create an unprovisioned instance with a custom event channel capacity
    pub fn with_event_capacity(
        source: Arc<dyn RangeSource>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<RefreshEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let ranges = Self {
            source,
            store: SnapshotStore::new(),
            inner: Mutex::new(Inner {
                state: LifecycleState::Uninitialized,
                config: None,
                event_tx: Some(tx),
                stop_tx: None,
                task: None,
            }),
        };

        (ranges, rx)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fill defaults, validate, and start the background refresh
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `Error::Config`: Invalid configuration, instance stays uninitialized
    /// - `Error::Lifecycle`: Already provisioned, or no runtime available
    pub fn provision(&self, config: RefreshConfig) -> Result<()> {
        let mut inner = self.lock();

        if inner.state != LifecycleState::Uninitialized {
            return Err(Error::lifecycle(format!(
                "cannot provision an instance in state {:?}",
                inner.state
            )));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::lifecycle(format!("provision requires a tokio runtime: {}", e))
        })?;

        let event_tx = inner
            .event_tx
            .clone()
            .ok_or_else(|| Error::lifecycle("event channel already consumed"))?;

        let scheduler =
            RefreshScheduler::new(self.source.clone(), self.store.clone(), config, event_tx)?;
        let resolved = *scheduler.config();

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = runtime.spawn(scheduler.run(stop_rx));

        inner.event_tx = None;
        inner.config = Some(resolved);
        inner.stop_tx = Some(stop_tx);
        inner.task = Some(task);
        inner.state = LifecycleState::Running;

        info!(
            source = self.source.name(),
            interval = ?resolved.interval,
            timeout = ?resolved.timeout_limit(),
            "provisioned IP range refresher"
        );

        Ok(())
    }

    /// Signal the background refresh to stop
    ///
    /// A no-op when never provisioned or already stopped. Does not wait for
    /// the task to exit; see [`CdnRanges::shutdown`].
    pub fn cleanup(&self) -> Result<()> {
        let mut inner = self.lock();

        match inner.stop_tx.take() {
            Some(stop_tx) => {
                // The task may already have exited
                let _ = stop_tx.send(());
                inner.state = LifecycleState::Stopped;
                info!(source = self.source.name(), "stopping IP range refresher");
            }
            None => {
                debug!(state = ?inner.state, "cleanup called with nothing to stop");
            }
        }

        Ok(())
    }

    /// Signal stop and wait for the background task to exit
    pub async fn shutdown(&self) -> Result<()> {
        self.cleanup()?;

        let task = self.lock().task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "refresh task ended abnormally");
            }
        }

        Ok(())
    }

    /// The current IP ranges
    ///
    /// Empty until the first successful refresh. Never blocks on a refresh in
    /// progress.
    pub fn ip_ranges(&self) -> Arc<Snapshot> {
        self.store.read()
    }

    /// A handle to the underlying store, for readers that outlive `self`
    pub fn store(&self) -> SnapshotStore {
        self.store.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    /// The resolved configuration, once provisioned
    pub fn config(&self) -> Option<RefreshConfig> {
        self.lock().config
    }
}

impl Drop for CdnRanges {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(stop_tx) = inner.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}
