//! Security module for the codelens HTTP front end.
//!
//! This module provides the mutual-authentication protocol between the
//! editor client and the server:
//! - One-shot secret delivery from the launcher
//! - HMAC-SHA256 request verification, loopback callers only
//! - HMAC-SHA256 signing of every response

pub mod authenticator;
pub mod secret;
pub mod signing;

pub use authenticator::{
    is_loopback_host, is_loopback_peer, AuthError, AuthenticatedRequest, RequestAuthenticator,
};
pub use secret::{encode_secret_document, parse_secret_document, read_secret_file, Secret, SECRET_FIELD};
pub use signing::{
    constant_time_eq, HmacSigner, RequestSigner, ResponseSigner, DIGEST_LEN, HMAC_HEADER,
};

/// Both halves of the message protocol, built from one secret.
#[derive(Debug, Clone)]
pub struct MessageSecurity {
    pub authenticator: RequestAuthenticator,
    pub signer: ResponseSigner,
}

impl MessageSecurity {
    pub fn new(secret: &Secret) -> Self {
        Self {
            authenticator: RequestAuthenticator::new(secret),
            signer: ResponseSigner::new(secret),
        }
    }
}
