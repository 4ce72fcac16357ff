//! Telemetry for the codelens HTTP front end.
//!
//! Provides structured logging and security audit events. All output goes to
//! stderr or a local file; nothing is sent over the network.

mod logging;
pub mod security_log;

pub use logging::{init_logging, LogConfig, LogError, LogFormat, LogLevel};
pub use security_log::{log_security_event, SecurityEvent, SecuritySeverity};
