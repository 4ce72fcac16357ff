//! Process shutdown signalling.
//!
//! A single one-shot trigger shared by everything that may end the process
//! (the idle watchdog, Ctrl-C) and everything that must react to it (the
//! serve loop). The first trigger wins and records why; later triggers are
//! no-ops. There is no drain phase: in-flight requests are dropped.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// Why the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The idle watchdog found no authenticated traffic for too long.
    IdleTimeout,
    /// The process received an interrupt.
    Signal,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdleTimeout => "idle_timeout",
            Self::Signal => "signal",
        }
    }
}

/// Cloneable handle to the one-shot shutdown trigger.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `true` only for the call that took effect.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            tracing::info!(reason = reason.as_str(), "Shutdown requested");
        }
        self.token.cancel();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason recorded by the first trigger, if any.
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn triggered(&self) -> ShutdownReason {
        self.token.cancelled().await;
        self.reason().unwrap_or(ShutdownReason::Signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_trigger_wins() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
        assert_eq!(signal.reason(), None);

        assert!(signal.trigger(ShutdownReason::IdleTimeout));
        assert!(!signal.trigger(ShutdownReason::Signal));

        assert!(signal.is_triggered());
        assert_eq!(signal.reason(), Some(ShutdownReason::IdleTimeout));
    }

    #[tokio::test]
    async fn test_clones_observe_trigger() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();

        let handle = tokio::spawn(async move { waiter.triggered().await });
        signal.trigger(ShutdownReason::Signal);

        assert_eq!(handle.await.unwrap(), ShutdownReason::Signal);
    }
}
