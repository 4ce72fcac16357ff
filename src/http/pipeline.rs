//! Request pipeline layered around every route.
//!
//! Order per request:
//! 1. Reject non-loopback peers and hosts, before the body is read.
//! 2. Buffer the body up to the configured limit, then verify the request HMAC.
//! 3. Record activity for the idle watchdog (authenticated requests only).
//! 4. Run the handler.
//! 5. Sign the response body, whatever its status.
//!
//! Without a configured secret, step 1 and the HMAC check are skipped, and so
//! is step 5.

use std::net::SocketAddr;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use super::state::AppState;
use crate::security::{
    is_loopback_host, is_loopback_peer, AuthError, MessageSecurity, HMAC_HEADER,
};
use crate::telemetry::SecurityEvent;

pub async fn pipeline(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(security) = state.security.clone() else {
        let response = match buffer_request(request, state.max_body_bytes).await {
            Ok(request) => {
                state.activity.touch();
                next.run(request).await
            }
            Err(e) => e.into_response(),
        };
        return response;
    };

    let response = match admit(&state, &security, request).await {
        Ok(request) => next.run(request).await,
        Err(e) => e.into_response(),
    };
    sign_response(&security, response).await
}

/// Check origin, buffer, check signature, and record activity.
async fn admit(
    state: &AppState,
    security: &MessageSecurity,
    request: Request,
) -> Result<Request, ApiError> {
    if let Some(ConnectInfo(peer)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        if !is_loopback_peer(peer) {
            let peer = peer.to_string();
            crate::security_log!(
                SecurityEvent::NonLocalPeer,
                "Rejected request from non-loopback peer",
                "peer" => peer.as_str()
            );
            return Err(AuthError::NonLocalOrigin.into());
        }
    }

    let host = declared_host(request.headers(), request.uri());
    let path = request.uri().path().to_string();
    if !host.as_deref().is_some_and(is_loopback_host) {
        let host = host.unwrap_or_default();
        crate::security_log!(
            SecurityEvent::NonLocalOrigin,
            "Rejected request from non-local host",
            "path" => path.as_str(),
            "host" => host.as_str()
        );
        return Err(AuthError::NonLocalOrigin.into());
    }

    let (mut parts, bytes) = buffer(request, state.max_body_bytes).await?;

    let verdict = security.authenticator.authenticate(
        host.as_deref(),
        &parts.headers,
        &parts.method,
        &path,
        &bytes,
    );
    match verdict {
        Ok(authenticated) => {
            state.activity.touch();
            crate::security_log!(
                SecurityEvent::AuthSuccess,
                "Request authenticated",
                "path" => path.as_str()
            );
            parts.extensions.insert(authenticated);
            Ok(Request::from_parts(parts, Body::from(bytes)))
        }
        Err(e) => {
            let host = host.unwrap_or_default();
            crate::security_log!(
                e.security_event(),
                "Rejected unauthenticated request",
                "path" => path.as_str(),
                "host" => host.as_str()
            );
            Err(e.into())
        }
    }
}

async fn buffer_request(request: Request, limit: usize) -> Result<Request, ApiError> {
    let (parts, bytes) = buffer(request, limit).await?;
    Ok(Request::from_parts(parts, Body::from(bytes)))
}

async fn buffer(request: Request, limit: usize) -> Result<(Parts, Bytes), ApiError> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, limit, "Failed to buffer request body");
        ApiError::PayloadTooLarge { limit }
    })?;
    Ok((parts, bytes))
}

/// `Host` header, falling back to the URI authority.
fn declared_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
}

async fn sign_response(security: &MessageSecurity, response: Response) -> Response {
    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let (error_parts, error_body) = ApiError::Internal(e.to_string()).into_response().into_parts();
            parts = error_parts;
            match to_bytes(error_body, usize::MAX).await {
                Ok(bytes) => bytes,
                Err(_) => Bytes::new(),
            }
        }
    };

    match HeaderValue::from_str(&security.signer.sign(&bytes)) {
        Ok(signature) => {
            parts.headers.insert(HMAC_HEADER, signature);
        }
        Err(e) => tracing::error!(error = %e, "Response signature is not a valid header value"),
    }
    Response::from_parts(parts, Body::from(bytes))
}
