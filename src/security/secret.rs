//! One-shot delivery of the shared HMAC secret.
//!
//! The launcher writes `{"hmac_secret": "<base64>"}` to a temporary file and
//! passes its path on the command line. The server reads the file once,
//! removes it, and keeps the decoded bytes in memory for the process lifetime.
//!
//! SECURITY: the file is removed before its contents are parsed, so a
//! malformed document never lingers on disk with the secret inside it.

use std::fmt;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use zeroize::Zeroizing;

use crate::config::ConfigError;

/// Name of the JSON field holding the base64-encoded secret.
pub const SECRET_FIELD: &str = "hmac_secret";

/// Shared secret bytes. Never printed, zeroed on drop.
#[derive(Clone)]
pub struct Secret {
    bytes: Zeroizing<Vec<u8>>,
}

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes.into()),
        }
    }

    /// Raw key material. Only the signing primitive should call this.
    #[inline]
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length (safe to log).
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED; {} bytes])", self.bytes.len())
    }
}

/// Read the secret exchange file, delete it, and decode the secret.
///
/// # Errors
///
/// - [`ConfigError::SecretFileRead`] if the file cannot be read (nothing is removed)
/// - [`ConfigError::SecretFileRemove`] if the file cannot be deleted after reading
/// - [`ConfigError::MalformedSecretFile`] if the contents are not a JSON object
///   with a string secret field
/// - [`ConfigError::MissingSecretField`] if the field is absent
/// - [`ConfigError::InvalidSecretEncoding`] / [`ConfigError::EmptySecret`] for bad values
pub fn read_secret_file(path: &Path) -> Result<Secret, ConfigError> {
    let contents = fs::read(path).map_err(|source| ConfigError::SecretFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let contents = Zeroizing::new(contents);

    fs::remove_file(path).map_err(|source| ConfigError::SecretFileRemove {
        path: path.to_path_buf(),
        source,
    })?;

    parse_secret_document(&contents)
}

/// Decode a secret exchange document that has already been read.
pub fn parse_secret_document(contents: &[u8]) -> Result<Secret, ConfigError> {
    let document: serde_json::Value = serde_json::from_slice(contents)
        .map_err(|e| ConfigError::MalformedSecretFile(e.to_string()))?;

    let field = document
        .get(SECRET_FIELD)
        .ok_or(ConfigError::MissingSecretField(SECRET_FIELD))?;
    let encoded = field.as_str().ok_or_else(|| {
        ConfigError::MalformedSecretFile(format!("`{SECRET_FIELD}` must be a string"))
    })?;

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ConfigError::InvalidSecretEncoding(e.to_string()))?;
    if bytes.is_empty() {
        return Err(ConfigError::EmptySecret);
    }
    Ok(Secret::new(bytes))
}

/// Build the document a launcher writes for [`read_secret_file`].
pub fn encode_secret_document(secret: &Secret) -> String {
    serde_json::json!({ SECRET_FIELD: STANDARD.encode(secret.expose()) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::TempPath {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.into_temp_path()
    }

    #[test]
    fn test_reads_and_removes_file() {
        let document = encode_secret_document(&Secret::new("secret"));
        let path = write_temp(&document);

        let secret = read_secret_file(&path).unwrap();

        assert_eq!(secret.expose(), b"secret");
        assert!(!path.exists(), "secret file must be deleted after reading");
    }

    #[test]
    fn test_malformed_file_is_still_removed() {
        let path = write_temp("not json at all");

        let result = read_secret_file(&path);

        assert!(matches!(result, Err(ConfigError::MalformedSecretFile(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_field_rejected() {
        let path = write_temp(r#"{"secret": "c2VjcmV0"}"#);

        let result = read_secret_file(&path);

        assert!(matches!(result, Err(ConfigError::MissingSecretField("hmac_secret"))));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_secret_file(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::SecretFileRead { .. })));
    }

    #[test]
    fn test_non_string_field_rejected() {
        let result = parse_secret_document(br#"{"hmac_secret": 42}"#);
        assert!(matches!(result, Err(ConfigError::MalformedSecretFile(_))));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let result = parse_secret_document(br#"{"hmac_secret": "***"}"#);
        assert!(matches!(result, Err(ConfigError::InvalidSecretEncoding(_))));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let result = parse_secret_document(br#"{"hmac_secret": ""}"#);
        assert!(matches!(result, Err(ConfigError::EmptySecret)));
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }
}
