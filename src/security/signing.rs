//! HMAC-SHA256 request and response signing.
//!
//! Requests are signed over `(method, path, body)` with a two-level keyed
//! hash: each part is hashed on its own, then the concatenated part digests
//! are hashed again. This binds the fields together without a separator that
//! a path or body could contain. Responses are signed over the body alone.
//!
//! Digests travel base64-encoded in the [`HMAC_HEADER`] header in both
//! directions.

use std::fmt;

use axum::http::{HeaderMap, HeaderValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::secret::Secret;

/// Header carrying the base64 digest on requests and responses.
pub const HMAC_HEADER: &str = "x-jedihttp-hmac";

/// Length of an HMAC-SHA256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

pub type Digest = [u8; DIGEST_LEN];

type HmacSha256 = Hmac<Sha256>;

/// Keyed hash primitive shared by the authenticator and the response signer.
#[derive(Clone)]
pub struct HmacSigner {
    keyed: HmacSha256,
}

impl HmacSigner {
    pub fn new(secret: &Secret) -> Self {
        // HMAC accepts keys of any length
        let keyed = HmacSha256::new_from_slice(secret.expose())
            .expect("HMAC accepts keys of any length");
        Self { keyed }
    }

    /// `KeyedHash(secret, content)`.
    pub fn keyed_hash(&self, content: &[u8]) -> Digest {
        let mut mac = self.keyed.clone();
        mac.update(content);
        mac.finalize().into_bytes().into()
    }

    /// `KeyedHash(secret, concat(KeyedHash(secret, part) for part in parts))`.
    pub fn digest(&self, parts: &[&[u8]]) -> Digest {
        let mut outer = self.keyed.clone();
        for part in parts {
            outer.update(&self.keyed_hash(part));
        }
        outer.finalize().into_bytes().into()
    }

    pub fn request_digest(&self, method: &str, path: &str, body: &[u8]) -> Digest {
        self.digest(&[method.as_bytes(), path.as_bytes(), body])
    }

    pub fn response_digest(&self, body: &[u8]) -> Digest {
        self.keyed_hash(body)
    }
}

impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HmacSigner([REDACTED])")
    }
}

/// Signs every outbound response body, error responses included.
#[derive(Debug, Clone)]
pub struct ResponseSigner {
    signer: HmacSigner,
}

impl ResponseSigner {
    pub fn new(secret: &Secret) -> Self {
        Self {
            signer: HmacSigner::new(secret),
        }
    }

    /// Header value for a response body.
    pub fn sign(&self, body: &[u8]) -> String {
        encode_digest(&self.signer.response_digest(body))
    }
}

/// Client-side counterpart: signs requests and checks response signatures.
///
/// Launchers and editor plugins embedding this crate use it to talk to the
/// server; the integration tests use it the same way.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    signer: HmacSigner,
}

impl RequestSigner {
    pub fn new(secret: &Secret) -> Self {
        Self {
            signer: HmacSigner::new(secret),
        }
    }

    /// Header value for a request.
    pub fn sign(&self, method: &str, path: &str, body: &[u8]) -> String {
        encode_digest(&self.signer.request_digest(method, path, body))
    }

    /// Insert the request signature into `headers`.
    pub fn sign_request_headers(&self, headers: &mut HeaderMap, method: &str, path: &str, body: &[u8]) {
        let encoded = self.sign(method, path, body);
        if let Ok(value) = HeaderValue::from_str(&encoded) {
            headers.insert(HMAC_HEADER, value);
        }
    }

    /// Whether a response carries a valid signature over `body`.
    pub fn is_response_authenticated(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        let Some(provided) = headers
            .get(HMAC_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(decode_digest)
        else {
            return false;
        };
        constant_time_eq(&provided, &self.signer.response_digest(body))
    }
}

pub fn encode_digest(digest: &Digest) -> String {
    STANDARD.encode(digest)
}

/// Decode a header value. `None` on invalid base64.
pub fn decode_digest(value: &str) -> Option<Vec<u8>> {
    STANDARD.decode(value.trim()).ok()
}

/// Constant-time comparison to prevent timing attacks.
///
/// Only a length mismatch returns early; digest length is public. Content is
/// folded over its full length regardless of where the first difference is.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| std::hint::black_box(acc | (x ^ y)));
    diff == 0
}
