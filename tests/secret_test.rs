//! Tests for one-shot secret delivery.

use std::fs;

use codelens_http::config::ConfigError;
use codelens_http::security::{encode_secret_document, read_secret_file, Secret};

#[test]
fn secret_file_is_read_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secret.json");
    fs::write(&path, encode_secret_document(&Secret::new("s3cr3t"))).unwrap();

    let secret = read_secret_file(&path).unwrap();

    assert_eq!(secret.expose(), b"s3cr3t");
    assert!(!path.exists());
}

#[test]
fn malformed_file_is_still_removed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secret.json");
    fs::write(&path, "not json").unwrap();

    let result = read_secret_file(&path);

    assert!(matches!(result, Err(ConfigError::MalformedSecretFile(_))));
    assert!(!path.exists());
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    assert!(matches!(
        read_secret_file(&path),
        Err(ConfigError::SecretFileRead { .. })
    ));
}

#[test]
fn missing_field_and_bad_encoding() {
    let dir = tempfile::tempdir().unwrap();

    let path = dir.path().join("a.json");
    fs::write(&path, r#"{"other": "c2VjcmV0"}"#).unwrap();
    assert!(matches!(
        read_secret_file(&path),
        Err(ConfigError::MissingSecretField("hmac_secret"))
    ));

    let path = dir.path().join("b.json");
    fs::write(&path, r#"{"hmac_secret": "***"}"#).unwrap();
    assert!(matches!(
        read_secret_file(&path),
        Err(ConfigError::InvalidSecretEncoding(_))
    ));
}

#[test]
fn secret_debug_is_redacted() {
    let secret = Secret::new("s3cr3t");
    assert!(!format!("{secret:?}").contains("s3cr3t"));
}
