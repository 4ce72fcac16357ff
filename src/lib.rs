//! codelens HTTP front end
//!
//! Serves a stateful, single-threaded code-analysis engine to editor clients
//! over localhost HTTP.
//!
//! # Guarantees
//!
//! - **Mutual authentication**: with a secret configured, every request must
//!   come from a loopback host and carry an HMAC over its method, path and
//!   body; every response, including errors, carries an HMAC over its body.
//! - **Exclusive engine access**: engine calls never overlap, and per-request
//!   setting overrides are reverted before the next call starts.
//! - **Idle shutdown**: an optional watchdog stops the process when no
//!   authenticated request has arrived for too long.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod security;
pub mod shutdown;
pub mod telemetry;
pub mod watchdog;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use config::ServerConfig;
use engine::{AnalysisEngine, ExclusiveEngineGate};
use http::AppState;
use security::MessageSecurity;
use shutdown::{ShutdownReason, ShutdownSignal};
use watchdog::{ActivityTracker, IdleWatchdog, WatchdogConfig};

pub use error::ServerError;

/// A configured server, ready to run on a bound listener.
#[derive(Debug)]
pub struct Server {
    state: AppState,
    watchdog: WatchdogConfig,
    shutdown: ShutdownSignal,
}

impl Server {
    pub fn new(config: ServerConfig, engine: impl AnalysisEngine + 'static) -> Self {
        let security = config.secret.as_ref().map(MessageSecurity::new);
        let state = AppState::new(
            Arc::new(ExclusiveEngineGate::new(engine)),
            security,
            Arc::new(ActivityTracker::new()),
            config.max_body_bytes,
        );
        Self {
            state,
            watchdog: config.watchdog,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Handle for stopping the server from outside (e.g. on Ctrl-C).
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The routed application, for in-process use without a socket.
    pub fn router(&self) -> Router {
        http::router(self.state.clone())
    }

    /// Serve on `listener` until shutdown is triggered.
    pub async fn run(self, listener: TcpListener) -> Result<ShutdownReason, ServerError> {
        let watchdog = IdleWatchdog::start(
            self.watchdog,
            self.state.activity.clone(),
            self.shutdown.clone(),
        );
        let result = http::serve(listener, self.state, self.shutdown).await;
        watchdog.cancel();
        Ok(result?)
    }
}
