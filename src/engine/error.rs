//! Analysis engine error types.
//!
//! All errors are fail-closed: bad settings and positions are rejected, not
//! clamped.

use thiserror::Error;

/// Errors raised by an engine during a gated call.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("Invalid value for setting {name}: expected {expected}")]
    InvalidSettingValue { name: String, expected: &'static str },

    #[error("Position {line}:{column} is outside the source")]
    InvalidPosition { line: usize, column: usize },

    #[error("Invalid module name: {0}")]
    InvalidModuleName(String),

    #[error("Engine call panicked: {0}")]
    Panicked(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),
}

impl EngineError {
    /// Short exception name reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownSetting(_) => "UnknownSetting",
            Self::InvalidSettingValue { .. } => "InvalidSettingValue",
            Self::InvalidPosition { .. } => "InvalidPosition",
            Self::InvalidModuleName(_) => "InvalidModuleName",
            Self::Panicked(_) => "Panicked",
            Self::Analysis(_) => "AnalysisError",
        }
    }

    /// Returns true if the client sent something the engine cannot use.
    pub fn is_client_input(&self) -> bool {
        matches!(
            self,
            Self::UnknownSetting(_)
                | Self::InvalidSettingValue { .. }
                | Self::InvalidPosition { .. }
                | Self::InvalidModuleName(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(EngineError::UnknownSetting("x".into()).kind(), "UnknownSetting");
        assert_eq!(EngineError::Analysis("boom".into()).kind(), "AnalysisError");
    }

    #[test]
    fn test_client_input_classification() {
        assert!(EngineError::InvalidPosition { line: 9, column: 0 }.is_client_input());
        assert!(!EngineError::Panicked("boom".into()).is_client_input());
    }

    #[test]
    fn test_display() {
        let err = EngineError::InvalidSettingValue {
            name: "fast_parser".into(),
            expected: "boolean",
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for setting fast_parser: expected boolean"
        );
    }
}
