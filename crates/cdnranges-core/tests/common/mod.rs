//! Test doubles and common utilities for refresh contract tests
//!
//! These sources never touch the network. They let tests script exactly
//! what each fetch returns and observe how often, and how concurrently, the
//! scheduler calls them.

#![allow(dead_code)]

use cdnranges_core::error::{Error, Result};
use cdnranges_core::{RangeSource, RefreshEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};

pub const LIST_A: &str = "1.2.3.0/24\n\n# comment\nbad-line\n5.6.7.0/16";
pub const LIST_B: &str = "185.49.84.0/22\n94.182.182.0/24\n";

/// What a scripted fetch should do
#[derive(Debug, Clone)]
pub enum Response {
    /// Return the body immediately
    Body(&'static str),
    /// Wait, then return the body
    Slow(Duration, &'static str),
    /// Fail with a status code
    Status(u16),
    /// Fail with a transport error
    Transport(&'static str),
}

/// A RangeSource that plays back a fixed script of responses
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Response>>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    timeouts_seen: Arc<Mutex<Vec<Option<Duration>>>>,
}

impl ScriptedSource {
    pub fn new(responses: impl IntoIterator<Item = Response>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            timeouts_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times fetch() was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Timeouts passed to each fetch() call
    pub fn timeouts_seen(&self) -> Vec<Option<Duration>> {
        self.timeouts_seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RangeSource for ScriptedSource {
    async fn fetch(&self, timeout: Option<Duration>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.timeouts_seen.lock().unwrap().push(timeout);

        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Response::Transport("script exhausted"));

        match response {
            Response::Body(body) => Ok(body.to_string()),
            Response::Slow(delay, body) => {
                tokio::time::sleep(delay).await;
                Ok(body.to_string())
            }
            Response::Status(code) => Err(Error::status(self.name(), code)),
            Response::Transport(msg) => Err(Error::fetch(self.name(), msg)),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Counts a running fetch; decrements on drop so cancelled fetches are released too
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A RangeSource that blocks every fetch until the test releases it
pub struct GatedSource {
    gate: Arc<Semaphore>,
    body: &'static str,
    dropped: Arc<AtomicBool>,
}

impl GatedSource {
    pub fn new(body: &'static str) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let source = Self {
            gate: gate.clone(),
            body,
            dropped: Arc::new(AtomicBool::new(false)),
        };
        (source, gate)
    }

    /// Flag that flips to true when the source is dropped
    pub fn drop_flag(&self) -> Arc<AtomicBool> {
        self.dropped.clone()
    }
}

impl Drop for GatedSource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl RangeSource for GatedSource {
    async fn fetch(&self, _timeout: Option<Duration>) -> Result<String> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| Error::fetch(self.name(), e.to_string()))?;
        permit.forget();
        Ok(self.body.to_string())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// A RangeSource that cycles through bodies forever
pub struct CyclingSource {
    bodies: Vec<&'static str>,
    next: AtomicUsize,
}

impl CyclingSource {
    pub fn new(bodies: Vec<&'static str>) -> Self {
        Self {
            bodies,
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl RangeSource for CyclingSource {
    async fn fetch(&self, _timeout: Option<Duration>) -> Result<String> {
        let idx = self.next.fetch_add(1, Ordering::SeqCst) % self.bodies.len();
        Ok(self.bodies[idx].to_string())
    }

    fn name(&self) -> &str {
        "cycling"
    }
}

/// Receive the next event, failing the test if none arrives in time
///
/// Under paused time the deadline is virtual, so keep it well above any
/// interval the test waits for.
pub async fn next_event(rx: &mut mpsc::Receiver<RefreshEvent>) -> RefreshEvent {
    tokio::time::timeout(Duration::from_secs(7 * 24 * 3600), rx.recv())
        .await
        .expect("event arrives before deadline")
        .expect("event channel open")
}

/// Skip events until a refresh outcome (success or failure) arrives
pub async fn next_outcome(rx: &mut mpsc::Receiver<RefreshEvent>) -> RefreshEvent {
    loop {
        match next_event(rx).await {
            event @ (RefreshEvent::Refreshed { .. } | RefreshEvent::RefreshFailed { .. }) => {
                return event;
            }
            _ => continue,
        }
    }
}

/// Render a snapshot as strings for easy comparison
pub fn as_strings(prefixes: &[cdnranges_core::IpNet]) -> Vec<String> {
    prefixes.iter().map(|p| p.to_string()).collect()
}
