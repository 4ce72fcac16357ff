//! Shared per-server state handed to every handler and the pipeline layer.

use std::sync::Arc;

use crate::engine::ExclusiveEngineGate;
use crate::security::MessageSecurity;
use crate::watchdog::ActivityTracker;

#[derive(Debug, Clone)]
pub struct AppState {
    pub gate: Arc<ExclusiveEngineGate>,
    /// `None` when the server runs without a secret.
    pub security: Option<Arc<MessageSecurity>>,
    pub activity: Arc<ActivityTracker>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(
        gate: Arc<ExclusiveEngineGate>,
        security: Option<MessageSecurity>,
        activity: Arc<ActivityTracker>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            gate,
            security: security.map(Arc::new),
            activity,
            max_body_bytes,
        }
    }
}
