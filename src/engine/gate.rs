//! Exclusive access to the analysis engine.
//!
//! One process-wide mutex guards the engine. Per-request setting overrides
//! are applied after the lock is taken and rolled back to the startup
//! baseline before it is released, by a scope guard, so the rollback also
//! runs when the call fails or panics. Outside a call the engine is always
//! in its baseline configuration.

use parking_lot::Mutex;

use super::{AnalysisEngine, EngineError, EngineSettings};
use crate::telemetry::SecurityEvent;

type BoxedEngine = Box<dyn AnalysisEngine>;

/// Serializes every engine call and scopes setting overrides to one call.
pub struct ExclusiveEngineGate {
    engine: Mutex<BoxedEngine>,
    baseline: EngineSettings,
}

impl ExclusiveEngineGate {
    /// Take ownership of `engine` and snapshot its settings as the baseline.
    pub fn new(engine: impl AnalysisEngine + 'static) -> Self {
        Self::from_boxed(Box::new(engine))
    }

    pub fn from_boxed(engine: BoxedEngine) -> Self {
        let baseline = engine.settings();
        tracing::debug!(settings = baseline.len(), "Captured engine baseline settings");
        Self {
            engine: Mutex::new(engine),
            baseline,
        }
    }

    /// Settings captured when the gate was built.
    pub fn baseline(&self) -> &EngineSettings {
        &self.baseline
    }

    /// Settings the engine reports right now (waits for the lock).
    pub fn current_settings(&self) -> EngineSettings {
        self.engine.lock().settings()
    }

    /// Run `f` with exclusive access to the engine.
    ///
    /// `overrides` are applied first and restored to the baseline when `f`
    /// returns, fails, or unwinds. Empty overrides mutate nothing. If an
    /// override is rejected, the ones already applied are restored and the
    /// error is returned without calling `f`.
    pub fn with_engine<R>(
        &self,
        overrides: &EngineSettings,
        f: impl FnOnce(&mut dyn AnalysisEngine) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let mut engine = self.engine.lock();
        if overrides.is_empty() {
            return f(&mut **engine);
        }

        let mut scope = OverrideScope {
            engine: &mut *engine,
            baseline: &self.baseline,
            applied: Vec::with_capacity(overrides.len()),
        };
        for (name, value) in overrides.iter() {
            scope.engine.apply_setting(name, value)?;
            scope.applied.push(name.to_string());
        }
        f(&mut **scope.engine)
    }
}

impl std::fmt::Debug for ExclusiveEngineGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusiveEngineGate")
            .field("baseline", &self.baseline)
            .field("locked", &self.engine.is_locked())
            .finish()
    }
}

/// Restores every applied key to its baseline value on drop.
struct OverrideScope<'a> {
    engine: &'a mut BoxedEngine,
    baseline: &'a EngineSettings,
    applied: Vec<String>,
}

impl Drop for OverrideScope<'_> {
    fn drop(&mut self) {
        for name in self.applied.drain(..) {
            let restored = match self.baseline.get(&name) {
                Some(value) => self.engine.apply_setting(&name, value),
                None => Err(EngineError::UnknownSetting(name.clone())),
            };
            if let Err(e) = restored {
                let error = e.to_string();
                crate::security_log!(
                    SecurityEvent::SettingsRestoreFailed,
                    "Failed to restore engine setting to baseline",
                    "setting" => name.as_str(),
                    "error" => error.as_str()
                );
            }
        }
    }
}
