//! Tests for shutdown signalling.

use std::time::Duration;

use codelens_http::shutdown::{ShutdownReason, ShutdownSignal};

#[tokio::test]
async fn test_waiters_see_first_reason() {
    let signal = ShutdownSignal::new();
    let waiter = tokio::spawn({
        let signal = signal.clone();
        async move { signal.triggered().await }
    });

    assert!(signal.trigger(ShutdownReason::IdleTimeout));
    assert!(!signal.trigger(ShutdownReason::Signal));

    let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, ShutdownReason::IdleTimeout);
    assert_eq!(signal.reason(), Some(ShutdownReason::IdleTimeout));
}

#[tokio::test]
async fn test_triggered_resolves_immediately_after_trigger() {
    let signal = ShutdownSignal::new();
    signal.trigger(ShutdownReason::Signal);

    let reason = tokio::time::timeout(Duration::from_millis(100), signal.triggered())
        .await
        .unwrap();
    assert_eq!(reason, ShutdownReason::Signal);
}

#[test]
fn test_clones_share_state() {
    let signal = ShutdownSignal::new();
    let clone = signal.clone();
    clone.trigger(ShutdownReason::Signal);
    assert!(signal.is_triggered());
}
