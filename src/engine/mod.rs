//! Analysis engine boundary.
//!
//! The engine holds mutable global state and is not safe for concurrent use.
//! Everything in the server reaches it through [`ExclusiveEngineGate`], which
//! serializes calls and scopes per-request setting overrides.

pub mod error;
pub mod gate;
pub mod lexical;
pub mod settings;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::EngineError;
pub use gate::ExclusiveEngineGate;
pub use lexical::LexicalEngine;
pub use settings::EngineSettings;

/// Source text plus a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptQuery {
    pub source: String,
    /// 1-based line.
    pub line: usize,
    /// 0-based column (in characters).
    pub column: usize,
    pub source_path: Option<String>,
}

/// Parameters for listing the names defined in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamesQuery {
    pub source: String,
    pub path: Option<String>,
    pub all_scopes: bool,
    pub definitions: bool,
    pub references: bool,
}

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub module_path: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub docstring: String,
    pub description: String,
}

/// A definition, assignment, usage or name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub module_path: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub in_builtin_module: bool,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub docstring: String,
    pub description: String,
    pub full_name: Option<String>,
    pub is_keyword: bool,
}

/// A stateful code-analysis engine.
///
/// Implementations need not be `Sync`: the gate guarantees that at most one
/// thread calls into an engine at a time.
pub trait AnalysisEngine: Send {
    /// Current value of every recognised setting.
    fn settings(&self) -> EngineSettings;

    /// Set one setting. Unknown names and ill-typed values are errors and
    /// leave the engine unchanged.
    fn apply_setting(&mut self, name: &str, value: &Value) -> Result<(), EngineError>;

    fn completions(&mut self, query: &ScriptQuery) -> Result<Vec<Completion>, EngineError>;

    fn goto_definitions(&mut self, query: &ScriptQuery) -> Result<Vec<Definition>, EngineError>;

    fn goto_assignments(
        &mut self,
        query: &ScriptQuery,
        follow_imports: bool,
    ) -> Result<Vec<Definition>, EngineError>;

    fn usages(&mut self, query: &ScriptQuery) -> Result<Vec<Definition>, EngineError>;

    fn names(&mut self, query: &NamesQuery) -> Result<Vec<Definition>, EngineError>;

    /// Warm the engine's caches for the given modules.
    fn preload_modules(&mut self, modules: &[String]) -> Result<(), EngineError>;
}
