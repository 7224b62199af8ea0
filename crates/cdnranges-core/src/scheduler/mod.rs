//! Refresh scheduler
//!
//! The RefreshScheduler is responsible for:
//! - Fetching the range list immediately on start
//! - Fetching it again every `interval`
//! - Parsing each body and publishing it to the [`SnapshotStore`]
//! - Stopping promptly when signalled
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────┐
//!   tick / stop ─▶│ RefreshScheduler │
//!                 └──────────────────┘
//!                          │
//!        ┌─────────────────┼──────────────────┐
//!        │                 │                  │
//!        ▼                 ▼                  ▼
//! ┌─────────────┐   ┌─────────────┐   ┌───────────────┐
//! │ RangeSource │   │   parser    │   │ SnapshotStore │
//! │ (fetch)     │   │ (prefixes)  │   │ (replace)     │
//! └─────────────┘   └─────────────┘   └───────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Fetch the body (bounded by the configured timeout)
//! 2. On error: log, keep the previous snapshot, wait for the next tick
//! 3. Parse, skipping malformed lines
//! 4. Replace the snapshot
//! 5. Emit an event for monitoring/logging
//!
//! Cycles never overlap: a slow fetch delays the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::RefreshConfig;
use crate::error::{Error, Result};
use crate::parser::parse_prefixes_report;
use crate::state::{Snapshot, SnapshotStore};
use crate::traits::RangeSource;

/// Events emitted by the RefreshScheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    /// Scheduler started
    Started {
        source: String,
        interval: Duration,
    },

    /// A cycle published a new snapshot
    Refreshed {
        source: String,
        count: usize,
        rejected: usize,
    },

    /// A cycle failed, previous snapshot kept
    RefreshFailed {
        source: String,
        error: String,
        initial: bool,
    },

    /// Scheduler stopped
    Stopped {
        reason: String,
    },
}

/// Background refresh loop for one range source
///
/// ## Lifecycle
///
/// 1. Create with [`RefreshScheduler::new()`]
/// 2. Spawn [`RefreshScheduler::run()`] with a stop receiver
/// 3. Send on (or drop) the stop sender to terminate the loop
pub struct RefreshScheduler {
    /// Where the range list comes from
    source: Arc<dyn RangeSource>,

    /// Where parsed snapshots are published
    store: SnapshotStore,

    /// Resolved refresh settings
    config: RefreshConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<RefreshEvent>,
}

impl RefreshScheduler {
    /// Create a new scheduler
    ///
    /// Unset config fields are filled with defaults before validation.
    pub fn new(
        source: Arc<dyn RangeSource>,
        store: SnapshotStore,
        config: RefreshConfig,
        event_tx: mpsc::Sender<RefreshEvent>,
    ) -> Result<Self> {
        let config = config.with_defaults();
        config.validate()?;

        Ok(Self {
            source,
            store,
            config,
            event_tx,
        })
    }

    /// The resolved configuration
    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Run the refresh loop until `stop_rx` fires or its sender is dropped
    ///
    /// The first cycle starts immediately. Stop is observed while waiting for
    /// the next tick and while a fetch is in flight; an interrupted fetch is
    /// dropped and leaves the current snapshot untouched.
    pub async fn run(self, mut stop_rx: oneshot::Receiver<()>) {
        let source = self.source.name().to_string();
        let interval = self.config.interval;

        info!(
            source = %source,
            interval = ?interval,
            timeout = ?self.config.timeout_limit(),
            "starting IP range refresh"
        );
        self.emit_event(RefreshEvent::Started {
            source: source.clone(),
            interval,
        });

        // An interval too large to schedule never ticks; the initial cycle still runs
        let mut ticker = Instant::now().checked_add(interval).map(|start| {
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        if ticker.is_none() {
            warn!(source = %source, interval = ?interval, "refresh interval too large, only the initial fetch will run");
        }

        let mut initial = true;
        let reason = loop {
            tokio::select! {
                biased;

                _ = &mut stop_rx => break "stop signal received",

                result = self.refresh_once() => {
                    if let Err(e) = result {
                        if initial {
                            warn!(source = %source, error = %e, "failed to fetch initial IP ranges");
                        } else {
                            error!(source = %source, error = %e, "failed to refresh IP ranges");
                        }
                        self.emit_event(RefreshEvent::RefreshFailed {
                            source: source.clone(),
                            error: e.to_string(),
                            initial,
                        });
                    }
                }
            }
            initial = false;

            tokio::select! {
                biased;

                _ = &mut stop_rx => break "stop signal received",

                _ = next_tick(&mut ticker) => {
                    debug!(source = %source, "refresh interval elapsed");
                }
            }
        };

        info!(source = %source, reason, "IP range refresh stopped");
        self.emit_event(RefreshEvent::Stopped {
            reason: reason.to_string(),
        });
    }

    /// Perform one fetch-parse-replace cycle
    ///
    /// # Returns
    ///
    /// - `Ok(count)`: Number of prefixes now published
    /// - `Err(Error)`: Fetch failed, snapshot unchanged
    pub async fn refresh_once(&self) -> Result<usize> {
        let body = self.fetch().await?;
        let report = parse_prefixes_report(&body);
        let count = report.prefixes.len();
        let source = self.source.name();

        if count == 0 {
            warn!(source, rejected = report.rejected.len(), "fetched range list contains no IP ranges");
        }

        self.store.replace(Snapshot::new(report.prefixes, source));
        info!(source, count, "successfully fetched IP ranges");

        self.emit_event(RefreshEvent::Refreshed {
            source: source.to_string(),
            count,
            rejected: report.rejected.len(),
        });

        Ok(count)
    }

    /// Fetch the body, enforcing the timeout regardless of the source
    async fn fetch(&self) -> Result<String> {
        match self.config.timeout_limit() {
            Some(limit) => tokio::time::timeout(limit, self.source.fetch(Some(limit)))
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => self.source.fetch(None).await,
        }
    }

    /// Emit a scheduler event
    fn emit_event(&self, event: RefreshEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping refresh event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Nobody is listening
            }
        }
    }
}

/// Wait for the next tick, or forever when there is no ticker
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
