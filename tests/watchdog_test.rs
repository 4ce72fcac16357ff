//! Tests for idle shutdown timing.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use codelens_http::shutdown::{ShutdownReason, ShutdownSignal};
use codelens_http::watchdog::{ActivityTracker, IdleWatchdog, WatchdogConfig, WatchdogState};

const SEC: Duration = Duration::from_secs(1);

#[tokio::test(start_paused = true)]
async fn fires_once_threshold_passed() {
    let shutdown = ShutdownSignal::new();
    let start = Instant::now();
    let watchdog = IdleWatchdog::start(
        WatchdogConfig::from_seconds(5, 1),
        Arc::new(ActivityTracker::new()),
        shutdown.clone(),
    );

    let reason = shutdown.triggered().await;

    assert_eq!(reason, ShutdownReason::IdleTimeout);
    assert_eq!(start.elapsed(), 6 * SEC);
    tokio::task::yield_now().await;
    assert_eq!(watchdog.state(), WatchdogState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn activity_postpones_shutdown() {
    let shutdown = ShutdownSignal::new();
    let activity = Arc::new(ActivityTracker::new());
    let start = Instant::now();
    let _watchdog = IdleWatchdog::start(
        WatchdogConfig::from_seconds(5, 1),
        activity.clone(),
        shutdown.clone(),
    );

    tokio::time::sleep(4 * SEC).await;
    activity.touch();

    shutdown.triggered().await;
    assert_eq!(start.elapsed(), 10 * SEC);
}

#[tokio::test(start_paused = true)]
async fn disabled_watchdog_never_fires() {
    let shutdown = ShutdownSignal::new();
    let watchdog = IdleWatchdog::start(
        WatchdogConfig::from_seconds(0, 1),
        Arc::new(ActivityTracker::new()),
        shutdown.clone(),
    );

    tokio::time::sleep(3600 * SEC).await;

    assert_eq!(watchdog.state(), WatchdogState::Disabled);
    assert!(!shutdown.is_triggered());
}

#[tokio::test(start_paused = true)]
async fn dropping_watchdog_stops_it() {
    let shutdown = ShutdownSignal::new();
    let watchdog = IdleWatchdog::start(
        WatchdogConfig::from_seconds(2, 1),
        Arc::new(ActivityTracker::new()),
        shutdown.clone(),
    );
    drop(watchdog);

    tokio::time::sleep(60 * SEC).await;
    assert!(!shutdown.is_triggered());
}
