//! Contract Test: Shutdown Determinism
//!
//! This test verifies that shutdown is deterministic and complete.
//!
//! Constraints verified:
//! - The refresh task terminates on cleanup
//! - Stop is observed while waiting for a tick and while a fetch is in flight
//! - Cleanup is safe without provision and safe to repeat
//! - Dropping the controller stops the task
//! - No resources remain referenced after shutdown
//!
//! If this test fails, someone has added:
//! - Detached background tasks
//! - Tasks that ignore cancellation
//! - Double-close of the stop signal

mod common;

use cdnranges_core::{CdnRanges, LifecycleState, RefreshConfig, RefreshEvent};
use common::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn shutdown_terminates_refresh_task() {
    let source = Arc::new(ScriptedSource::new([Response::Body(LIST_A)]));
    let (ranges, mut events) = CdnRanges::new(source);

    ranges.provision(RefreshConfig::default()).unwrap();
    assert!(matches!(next_outcome(&mut events).await, RefreshEvent::Refreshed { .. }));

    let result = tokio::time::timeout(SHUTDOWN_DEADLINE, ranges.shutdown()).await;
    assert!(result.is_ok(), "refresh task should stop within 5 seconds");
    assert_eq!(ranges.state(), LifecycleState::Stopped);

    assert!(matches!(
        next_event(&mut events).await,
        RefreshEvent::Stopped { .. }
    ));

    // The scheduler owned the only sender; once it exits the channel closes
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn stop_is_observed_during_interval_wait() {
    let source = Arc::new(ScriptedSource::new([Response::Body(LIST_A)]));
    let (ranges, mut events) = CdnRanges::new(source.clone());

    ranges
        .provision(RefreshConfig::new().with_interval(Duration::from_secs(24 * 3600)))
        .unwrap();
    assert!(matches!(next_outcome(&mut events).await, RefreshEvent::Refreshed { .. }));

    let result = tokio::time::timeout(SHUTDOWN_DEADLINE, ranges.shutdown()).await;
    assert!(result.is_ok(), "stop must not wait for the interval to elapse");
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn stop_is_observed_during_in_flight_fetch() {
    let (source, _gate) = GatedSource::new(LIST_B);
    let dropped = source.drop_flag();
    let (ranges, mut events) = CdnRanges::new(Arc::new(source));

    ranges.provision(RefreshConfig::default()).unwrap();
    assert!(matches!(next_event(&mut events).await, RefreshEvent::Started { .. }));

    // The fetch never completes on its own
    tokio::time::sleep(Duration::from_millis(20)).await;

    let result = tokio::time::timeout(SHUTDOWN_DEADLINE, ranges.shutdown()).await;
    assert!(result.is_ok(), "stop must not wait for a stuck fetch");
    assert!(ranges.ip_ranges().is_empty());

    drop(ranges);
    assert!(dropped.load(Ordering::SeqCst), "source should be released after shutdown");
}

#[tokio::test]
async fn cleanup_without_provision_is_safe() {
    let source = Arc::new(ScriptedSource::new([]));
    let (ranges, _events) = CdnRanges::new(source.clone());

    assert!(ranges.cleanup().is_ok());
    assert!(ranges.shutdown().await.is_ok());
    assert_eq!(ranges.state(), LifecycleState::Uninitialized);
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn multiple_cleanup_calls_are_safe() {
    let source = Arc::new(ScriptedSource::new([Response::Body(LIST_A)]));
    let (ranges, mut events) = CdnRanges::new(source);

    ranges.provision(RefreshConfig::default()).unwrap();
    assert!(matches!(next_outcome(&mut events).await, RefreshEvent::Refreshed { .. }));

    assert!(ranges.cleanup().is_ok());
    assert!(ranges.cleanup().is_ok());

    let result = tokio::time::timeout(SHUTDOWN_DEADLINE, ranges.shutdown()).await;
    assert!(result.is_ok(), "repeated cleanup should not cause issues");
    assert!(ranges.cleanup().is_ok());
    assert_eq!(ranges.state(), LifecycleState::Stopped);

    // Readers keep working after stop and see the last published list
    assert_eq!(ranges.ip_ranges().len(), 2);
}

#[tokio::test]
async fn dropping_controller_stops_task() {
    let (source, _gate) = GatedSource::new(LIST_B);
    let dropped = source.drop_flag();
    let (ranges, mut events) = CdnRanges::new(Arc::new(source));

    ranges.provision(RefreshConfig::default()).unwrap();
    assert!(matches!(next_event(&mut events).await, RefreshEvent::Started { .. }));

    drop(ranges);

    assert!(matches!(
        next_event(&mut events).await,
        RefreshEvent::Stopped { .. }
    ));
    assert!(events.recv().await.is_none());

    // The task has returned, so nothing holds the source any more
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn invalid_config_never_starts() {
    let source = Arc::new(ScriptedSource::new([Response::Body(LIST_A)]));
    let (ranges, _events) = CdnRanges::new(source.clone());

    let config = RefreshConfig::from_block("parspack {\n    retries 3\n}");
    assert!(config.is_err(), "unknown directive must fail configuration loading");

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ranges.state(), LifecycleState::Uninitialized);
    assert_eq!(source.calls(), 0);
}
