//! Fuzz target for request authentication.
//!
//! Arbitrary hosts, paths, bodies and signature headers must never panic,
//! and must never be accepted unless the host is loopback.

#![no_main]

use arbitrary::Arbitrary;
use axum::http::{HeaderMap, HeaderValue, Method};
use libfuzzer_sys::fuzz_target;

use codelens_http::security::{is_loopback_host, RequestAuthenticator, Secret, HMAC_HEADER};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    host: Option<&'a str>,
    path: &'a str,
    body: &'a [u8],
    signature: Option<&'a [u8]>,
}

fuzz_target!(|input: Input<'_>| {
    let authenticator = RequestAuthenticator::new(&Secret::new("fuzz-secret"));

    let mut headers = HeaderMap::new();
    if let Some(signature) = input.signature {
        if let Ok(value) = HeaderValue::from_bytes(signature) {
            headers.insert(HMAC_HEADER, value);
        }
    }

    let result = authenticator.authenticate(input.host, &headers, &Method::POST, input.path, input.body);
    if result.is_ok() {
        assert!(input.host.is_some_and(is_loopback_host));
    }
});
