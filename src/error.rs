//! Top-level server errors.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::telemetry::LogError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LogError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
