//! Inbound request authentication.
//!
//! SECURITY: a request is accepted only if it names a loopback host AND
//! carries a valid signature over its exact method, path and body. The host
//! check runs first and unconditionally: non-local traffic is refused even
//! when its signature is correct.

use std::net::SocketAddr;

use axum::http::{HeaderMap, Method};
use thiserror::Error;
use url::Url;

use super::secret::Secret;
use super::signing::{constant_time_eq, decode_digest, HmacSigner, HMAC_HEADER};
use crate::telemetry::SecurityEvent;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized, received request from non-local Host.")]
    NonLocalOrigin,

    #[error("Unauthorized, missing HMAC.")]
    MissingSignature,

    #[error("Unauthorized, received bad HMAC.")]
    BadSignature,
}

impl AuthError {
    pub fn security_event(&self) -> SecurityEvent {
        match self {
            Self::NonLocalOrigin => SecurityEvent::NonLocalOrigin,
            Self::MissingSignature => SecurityEvent::MissingSignature,
            Self::BadSignature => SecurityEvent::BadSignature,
        }
    }
}

/// A request that passed the origin and signature checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedRequest {
    method: Method,
    path: String,
}

impl AuthenticatedRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Verifies request origin and HMAC signature.
#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    signer: HmacSigner,
}

impl RequestAuthenticator {
    pub fn new(secret: &Secret) -> Self {
        Self {
            signer: HmacSigner::new(secret),
        }
    }

    /// Authenticate a request.
    ///
    /// `host` is the declared host (the `Host` header or URI authority).
    pub fn authenticate(
        &self,
        host: Option<&str>,
        headers: &HeaderMap,
        method: &Method,
        path: &str,
        body: &[u8],
    ) -> Result<AuthenticatedRequest, AuthError> {
        if !host.is_some_and(is_loopback_host) {
            return Err(AuthError::NonLocalOrigin);
        }

        let provided = headers.get(HMAC_HEADER).ok_or(AuthError::MissingSignature)?;
        let provided = provided
            .to_str()
            .ok()
            .and_then(decode_digest)
            .ok_or(AuthError::BadSignature)?;

        let expected = self.signer.request_digest(method.as_str(), path, body);
        if !constant_time_eq(&provided, &expected) {
            return Err(AuthError::BadSignature);
        }

        Ok(AuthenticatedRequest {
            method: method.clone(),
            path: path.to_string(),
        })
    }
}

/// Whether a declared host (optionally with a port) names this machine.
///
/// Only `127.0.0.1` and `localhost` are accepted.
pub fn is_loopback_host(host: &str) -> bool {
    match Url::parse(&format!("http://{host}")) {
        Ok(url) => matches!(url.host_str(), Some("127.0.0.1" | "localhost")),
        Err(_) => false,
    }
}

/// Whether a transport peer is on the loopback interface.
pub fn is_loopback_peer(addr: &SocketAddr) -> bool {
    addr.ip().is_loopback()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::signing::RequestSigner;

    fn signed_headers(secret: &str, method: &str, path: &str, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        RequestSigner::new(&Secret::new(secret)).sign_request_headers(&mut headers, method, path, body);
        headers
    }

    #[test]
    fn test_loopback_hosts() {
        assert!(is_loopback_host("127.0.0.1"));
        assert!(is_loopback_host("127.0.0.1:8080"));
        assert!(is_loopback_host("localhost"));
        assert!(is_loopback_host("LOCALHOST:1234"));
        assert!(!is_loopback_host("example.com"));
        assert!(!is_loopback_host("localhost.example.com"));
        assert!(!is_loopback_host("localhost@example.com"));
        assert!(!is_loopback_host("10.0.0.1"));
        assert!(!is_loopback_host(""));
    }

    #[test]
    fn test_loopback_peer() {
        assert!(is_loopback_peer(&"127.0.0.1:5000".parse().unwrap()));
        assert!(is_loopback_peer(&"[::1]:5000".parse().unwrap()));
        assert!(!is_loopback_peer(&"192.168.1.4:5000".parse().unwrap()));
    }

    #[test]
    fn test_non_local_rejected_even_when_signed() {
        let auth = RequestAuthenticator::new(&Secret::new("secret"));
        let headers = signed_headers("secret", "POST", "/ready", b"");

        let result = auth.authenticate(Some("example.com"), &headers, &Method::POST, "/ready", b"");

        assert_eq!(result, Err(AuthError::NonLocalOrigin));
    }

    #[test]
    fn test_missing_host_rejected() {
        let auth = RequestAuthenticator::new(&Secret::new("secret"));
        let headers = signed_headers("secret", "POST", "/ready", b"");
        let result = auth.authenticate(None, &headers, &Method::POST, "/ready", b"");
        assert_eq!(result, Err(AuthError::NonLocalOrigin));
    }

    #[test]
    fn test_missing_signature() {
        let auth = RequestAuthenticator::new(&Secret::new("secret"));
        let result = auth.authenticate(Some("127.0.0.1"), &HeaderMap::new(), &Method::POST, "/ready", b"");
        assert_eq!(result, Err(AuthError::MissingSignature));
    }

    #[test]
    fn test_garbage_signature_is_bad() {
        let auth = RequestAuthenticator::new(&Secret::new("secret"));
        let mut headers = HeaderMap::new();
        headers.insert(HMAC_HEADER, "!!not base64!!".parse().unwrap());
        let result = auth.authenticate(Some("127.0.0.1"), &headers, &Method::POST, "/ready", b"");
        assert_eq!(result, Err(AuthError::BadSignature));
    }

    #[test]
    fn test_valid_signature_accepted() {
        let auth = RequestAuthenticator::new(&Secret::new("secret"));
        let body = br#"{"source": "x = 1"}"#;
        let headers = signed_headers("secret", "POST", "/completions", body);

        let request = auth
            .authenticate(Some("127.0.0.1:9000"), &headers, &Method::POST, "/completions", body)
            .unwrap();

        assert_eq!(request.path(), "/completions");
        assert_eq!(*request.method(), Method::POST);
    }

    #[test]
    fn test_flipped_body_byte_rejected() {
        let auth = RequestAuthenticator::new(&Secret::new("secret"));
        let body = b"{\"source\": \"x = 1\"}".to_vec();
        let headers = signed_headers("secret", "POST", "/completions", &body);

        let mut tampered = body.clone();
        tampered[3] ^= 0x01;

        let result = auth.authenticate(Some("localhost"), &headers, &Method::POST, "/completions", &tampered);
        assert_eq!(result, Err(AuthError::BadSignature));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let auth = RequestAuthenticator::new(&Secret::new("secret"));
        let headers = signed_headers("wrong", "POST", "/ready", b"");
        let result = auth.authenticate(Some("127.0.0.1"), &headers, &Method::POST, "/ready", b"");
        assert_eq!(result, Err(AuthError::BadSignature));
    }
}
