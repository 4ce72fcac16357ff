//! Idle watchdog.
//!
//! Shuts the server down after a period without authenticated requests. The
//! check loop wakes every `check_interval`; it fires only when the client has
//! been silent longer than the threshold AND the loop itself woke on time.
//! A late wakeup (the runtime stalled, or the loop was starved of CPU) gives
//! the client one more interval to reach us before the server gives up.
//! Timing uses the monotonic runtime clock, which on Linux and macOS does not
//! advance while the host is suspended, so time spent asleep counts neither
//! as idle time nor as a late wakeup.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::shutdown::{ShutdownReason, ShutdownSignal};
use crate::telemetry::SecurityEvent;

/// Default gap between idle checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(600);

/// Time of the most recent authenticated request.
///
/// Written by every request, read by the watchdog loop. Never moves
/// backwards, even if two requests race to record their arrival.
#[derive(Debug)]
pub struct ActivityTracker {
    last_request: Mutex<Instant>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            last_request: Mutex::new(Instant::now()),
        }
    }

    /// Record a request arriving now.
    pub fn touch(&self) {
        let now = Instant::now();
        let mut last = self.last_request.lock();
        if now > *last {
            *last = now;
        }
    }

    pub fn last_request(&self) -> Instant {
        *self.last_request.lock()
    }

    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_request())
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Watchdog configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// `None` disables the watchdog entirely.
    pub idle_threshold: Option<Duration>,
    pub check_interval: Duration,
}

impl WatchdogConfig {
    pub fn disabled() -> Self {
        Self {
            idle_threshold: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Build from command-line seconds. A threshold of zero or less disables
    /// the watchdog; the interval is floored at one second.
    pub fn from_seconds(idle_suicide_seconds: i64, check_interval_seconds: u64) -> Self {
        let idle_threshold = u64::try_from(idle_suicide_seconds)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        Self {
            idle_threshold,
            check_interval: Duration::from_secs(check_interval_seconds.max(1)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.idle_threshold.is_some()
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Watchdog lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Threshold not positive: no task, never shuts down.
    Disabled,
    /// Periodic check loop running.
    Active,
    /// Loop finished, either by firing or by cancellation.
    Stopped,
}

/// The idle decision, given the two elapsed times measured at a wakeup.
pub fn should_shut_down(
    idle_for: Duration,
    since_wakeup: Duration,
    idle_threshold: Duration,
    check_interval: Duration,
) -> bool {
    idle_for > idle_threshold && since_wakeup < check_interval * 2
}

/// Background idle check task.
#[derive(Debug)]
pub struct IdleWatchdog {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl IdleWatchdog {
    /// Start the watchdog. Must be called within a tokio runtime when the
    /// configuration is enabled.
    pub fn start(
        config: WatchdogConfig,
        activity: Arc<ActivityTracker>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let cancel = CancellationToken::new();
        let Some(idle_threshold) = config.idle_threshold else {
            tracing::debug!("Idle watchdog disabled");
            return Self { cancel, handle: None };
        };

        tracing::info!(
            idle_threshold_secs = idle_threshold.as_secs(),
            check_interval_secs = config.check_interval.as_secs(),
            "Idle watchdog started"
        );
        let handle = tokio::spawn(watch(
            idle_threshold,
            config.check_interval,
            activity,
            shutdown,
            cancel.clone(),
        ));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn state(&self) -> WatchdogState {
        match &self.handle {
            None => WatchdogState::Disabled,
            Some(handle) if handle.is_finished() => WatchdogState::Stopped,
            Some(_) => WatchdogState::Active,
        }
    }

    /// Stop the loop without triggering shutdown.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for IdleWatchdog {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn watch(
    idle_threshold: Duration,
    check_interval: Duration,
    activity: Arc<ActivityTracker>,
    shutdown: ShutdownSignal,
    cancel: CancellationToken,
) {
    let mut last_wakeup = Instant::now();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(check_interval) => {}
        }

        let now = Instant::now();
        let idle_for = now.saturating_duration_since(activity.last_request());
        let since_wakeup = now.saturating_duration_since(last_wakeup);

        if should_shut_down(idle_for, since_wakeup, idle_threshold, check_interval) {
            let idle_secs = idle_for.as_secs().to_string();
            crate::security_log!(
                SecurityEvent::IdleShutdown,
                "Shutting down server due to inactivity",
                "idle_secs" => idle_secs.as_str()
            );
            shutdown.trigger(ShutdownReason::IdleTimeout);
            return;
        }

        if since_wakeup >= check_interval * 2 {
            tracing::debug!(
                since_wakeup_ms = since_wakeup.as_millis() as u64,
                "Late watchdog wakeup, allowing another interval"
            );
        }
        last_wakeup = now;
    }
}
