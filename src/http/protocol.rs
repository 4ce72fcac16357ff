//! JSON request and response bodies.

use serde::{Deserialize, Serialize};

use crate::engine::{Completion, Definition, EngineSettings, NamesQuery, ScriptQuery};

/// Body of `/completions`, `/gotodefinition` and `/usages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRequest {
    pub source: String,
    /// 1-based.
    pub line: usize,
    /// 0-based.
    pub col: usize,
    #[serde(default)]
    pub source_path: Option<String>,
    #[serde(default)]
    pub settings: EngineSettings,
}

impl ScriptRequest {
    pub fn query(&self) -> ScriptQuery {
        ScriptQuery {
            source: self.source.clone(),
            line: self.line,
            column: self.col,
            source_path: self.source_path.clone(),
        }
    }
}

/// Body of `/gotoassignment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GotoAssignmentRequest {
    #[serde(flatten)]
    pub script: ScriptRequest,
    #[serde(default)]
    pub follow_imports: bool,
}

/// Body of `/names`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamesRequest {
    pub source: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub all_scopes: bool,
    #[serde(default = "default_true")]
    pub definitions: bool,
    #[serde(default)]
    pub references: bool,
    #[serde(default)]
    pub settings: EngineSettings,
}

impl NamesRequest {
    pub fn query(&self) -> NamesQuery {
        NamesQuery {
            source: self.source.clone(),
            path: self.path.clone(),
            all_scopes: self.all_scopes,
            definitions: self.definitions,
            references: self.references,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Body of `/preload_module`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreloadModuleRequest {
    pub modules: Vec<String>,
    #[serde(default)]
    pub settings: EngineSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionsResponse {
    pub completions: Vec<Completion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionsResponse {
    pub definitions: Vec<Definition>,
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub exception: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}
