//! Command-line interface.
//!
//! ```bash
//! codelens-http --port 0 --hmac-file-secret /tmp/secret.json --idle-suicide-seconds 1800
//! ```

use std::path::PathBuf;

use clap::Parser;

use crate::config::{EnvConfig, ServerConfig};
use crate::security::Secret;
use crate::telemetry::{LogConfig, LogLevel};
use crate::watchdog::WatchdogConfig;

/// Localhost HTTP front end for the code-analysis engine.
#[derive(Debug, Clone, Parser)]
#[command(name = "codelens-http", version, about)]
pub struct Args {
    /// Host or address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind; 0 picks a free port.
    #[arg(long, default_value_t = 0)]
    pub port: u16,

    /// Log level.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log: LogLevel,

    /// JSON file holding the base64 HMAC secret. Deleted once read.
    #[arg(long)]
    pub hmac_file_secret: Option<PathBuf>,

    /// Shut down after this many seconds without an authenticated request.
    /// Zero or less disables.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub idle_suicide_seconds: i64,

    /// Seconds between idle checks.
    #[arg(long, default_value_t = 600)]
    pub check_interval_seconds: u64,
}

impl Args {
    pub fn log_config(&self, env: &EnvConfig) -> LogConfig {
        LogConfig {
            format: env.log_format,
            level: self.log.as_filter().to_string(),
            output_path: env.log_file.clone(),
        }
    }

    pub fn server_config(&self, env: &EnvConfig, secret: Option<Secret>) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            secret,
            watchdog: WatchdogConfig::from_seconds(
                self.idle_suicide_seconds,
                self.check_interval_seconds,
            ),
            max_body_bytes: env.max_body_bytes,
        }
    }
}
