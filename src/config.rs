//! Runtime configuration.
//!
//! Primary settings come from the command line (see [`crate::cli`]). Secondary
//! knobs are loaded from `CODELENS_*` environment variables with sensible
//! defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `CODELENS_MAX_BODY_BYTES` | 1024000 | Max request body size (bytes, floor 4096) |
//! | `CODELENS_LOG_FORMAT` | pretty | `pretty` or `json` |
//! | `CODELENS_LOG_FILE` | unset | Write JSON logs to this file instead of stderr |

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::security::Secret;
use crate::telemetry::LogFormat;
use crate::watchdog::WatchdogConfig;

/// Default request body limit (1000 KiB), the editor clients' buffer size.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1000 * 1024;

/// Smallest body limit accepted from the environment.
pub const MIN_MAX_BODY_BYTES: usize = 4096;

/// Errors raised while assembling the server configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read secret file {path}: {source}")]
    SecretFileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove secret file {path}: {source}")]
    SecretFileRemove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("secret file is not valid: {0}")]
    MalformedSecretFile(String),

    #[error("secret file has no `{0}` field")]
    MissingSecretField(&'static str),

    #[error("secret is not valid base64: {0}")]
    InvalidSecretEncoding(String),

    #[error("secret is empty")]
    EmptySecret,
}

/// Secondary configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub max_body_bytes: usize,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_format: LogFormat::default(),
            log_file: None,
        }
    }
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a log format env var, returning the default on missing or invalid.
fn parse_log_format(key: &str) -> LogFormat {
    match std::env::var(key) {
        Ok(val) => val.parse::<LogFormat>().unwrap_or_default(),
        Err(_) => LogFormat::default(),
    }
}

/// Parse an optional path env var; empty counts as unset.
fn parse_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|val| !val.is_empty())
        .map(PathBuf::from)
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let max_body_bytes = parse_usize("CODELENS_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES);
    let max_body_bytes = max_body_bytes.max(MIN_MAX_BODY_BYTES);

    EnvConfig {
        max_body_bytes,
        log_format: parse_log_format("CODELENS_LOG_FORMAT"),
        log_file: parse_path("CODELENS_LOG_FILE"),
    }
}

/// Everything the server needs to run.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface name or address to bind; resolved at bind time.
    pub host: String,
    pub port: u16,
    /// `None` disables request authentication and response signing.
    pub secret: Option<Secret>,
    pub watchdog: WatchdogConfig,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            secret: None,
            watchdog: WatchdogConfig::disabled(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}
