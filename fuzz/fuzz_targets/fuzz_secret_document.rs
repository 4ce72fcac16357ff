//! Fuzz target for secret file parsing.
//!
//! Arbitrary file contents must produce a secret or a config error, never a
//! panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use codelens_http::security::parse_secret_document;

fuzz_target!(|data: &[u8]| {
    if let Ok(secret) = parse_secret_document(data) {
        assert!(!secret.is_empty());
    }
});
