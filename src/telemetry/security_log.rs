//! Security audit logging.
//!
//! SECURITY: every authentication decision and secret lifecycle step is
//! emitted as a structured event so a launcher capturing stderr can tell a
//! misconfigured client from a probing one. Secret material never appears
//! in any field.

/// Security event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    /// Shared secret read from the exchange file.
    SecretLoaded,
    /// Server started without a secret; requests are not authenticated.
    AuthDisabled,
    /// Request accepted.
    AuthSuccess,
    /// Request named a host other than this machine.
    NonLocalOrigin,
    /// Request carried no signature header.
    MissingSignature,
    /// Signature header present but wrong.
    BadSignature,
    /// Transport peer outside the loopback interface.
    NonLocalPeer,
    /// Idle watchdog requested shutdown.
    IdleShutdown,
    /// A scoped setting override could not be rolled back.
    SettingsRestoreFailed,
}

impl SecurityEvent {
    /// Get the severity level for this event.
    pub fn severity(&self) -> SecuritySeverity {
        match self {
            Self::SecretLoaded => SecuritySeverity::Info,
            Self::AuthDisabled => SecuritySeverity::Warning,
            Self::AuthSuccess => SecuritySeverity::Debug,
            Self::NonLocalOrigin => SecuritySeverity::Warning,
            Self::MissingSignature => SecuritySeverity::Warning,
            Self::BadSignature => SecuritySeverity::Warning,
            Self::NonLocalPeer => SecuritySeverity::Critical,
            Self::IdleShutdown => SecuritySeverity::Info,
            Self::SettingsRestoreFailed => SecuritySeverity::Error,
        }
    }

    /// Get a string representation of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecretLoaded => "secret_loaded",
            Self::AuthDisabled => "auth_disabled",
            Self::AuthSuccess => "auth_success",
            Self::NonLocalOrigin => "non_local_origin",
            Self::MissingSignature => "missing_signature",
            Self::BadSignature => "bad_signature",
            Self::NonLocalPeer => "non_local_peer",
            Self::IdleShutdown => "idle_shutdown",
            Self::SettingsRestoreFailed => "settings_restore_failed",
        }
    }
}

/// Severity levels for security events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecuritySeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl SecuritySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Log a security event with structured data.
///
/// # Example
/// ```
/// use codelens_http::telemetry::{log_security_event, SecurityEvent};
///
/// log_security_event(
///     SecurityEvent::BadSignature,
///     "Request signature did not verify",
///     &[("path", "/completions")]
/// );
/// ```
pub fn log_security_event(event: SecurityEvent, message: &str, details: &[(&str, &str)]) {
    let event_type = event.as_str();
    let details = details
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ");

    match event.severity() {
        SecuritySeverity::Debug => {
            tracing::debug!(target: "security", event = event_type, %details, "{}", message)
        }
        SecuritySeverity::Info => {
            tracing::info!(target: "security", event = event_type, %details, "{}", message)
        }
        SecuritySeverity::Warning => {
            tracing::warn!(target: "security", event = event_type, %details, "{}", message)
        }
        SecuritySeverity::Error | SecuritySeverity::Critical => {
            tracing::error!(
                target: "security",
                event = event_type,
                severity = event.severity().as_str(),
                %details,
                "{}",
                message
            )
        }
    }
}

/// Convenience macro for logging security events.
#[macro_export]
macro_rules! security_log {
    ($event:expr, $message:expr) => {
        $crate::telemetry::security_log::log_security_event($event, $message, &[])
    };
    ($event:expr, $message:expr, $($key:expr => $value:expr),+) => {
        $crate::telemetry::security_log::log_security_event(
            $event,
            $message,
            &[$(($key, $value)),+]
        )
    };
}
