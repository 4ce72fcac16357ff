//! Routes and the serve loop.

use std::any::Any;
use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::Uri;
use axum::routing::post;
use axum::{middleware, Json, Router};
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::pipeline::pipeline;
use super::protocol::{
    CompletionsResponse, DefinitionsResponse, GotoAssignmentRequest, NamesRequest,
    PreloadModuleRequest, ScriptRequest,
};
use super::state::AppState;
use crate::engine::{AnalysisEngine, EngineError, EngineSettings};
use crate::shutdown::{ShutdownReason, ShutdownSignal};

pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/healthy", post(healthy))
        .route("/ready", post(ready))
        .route("/completions", post(completions))
        .route("/gotodefinition", post(goto_definition))
        .route("/gotoassignment", post(goto_assignment))
        .route("/usages", post(usages))
        .route("/names", post(names))
        .route("/preload_module", post(preload_module))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn_with_state(state.clone(), pipeline))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the listener fails or shutdown is triggered.
///
/// Shutdown does not wait for in-flight requests.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: ShutdownSignal,
) -> io::Result<ShutdownReason> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result?;
            Err(io::Error::other("listener closed"))
        }
        reason = shutdown.triggered() => Ok(reason),
    }
}

async fn healthy() -> Json<bool> {
    Json(true)
}

async fn ready() -> Json<bool> {
    Json(true)
}

async fn completions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CompletionsResponse>, ApiError> {
    let request: ScriptRequest = parse(&body)?;
    let query = request.query();
    let completions =
        run_gated(&state, request.settings, move |engine| engine.completions(&query)).await?;
    Ok(Json(CompletionsResponse { completions }))
}

async fn goto_definition(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DefinitionsResponse>, ApiError> {
    let request: ScriptRequest = parse(&body)?;
    let query = request.query();
    let definitions =
        run_gated(&state, request.settings, move |engine| engine.goto_definitions(&query)).await?;
    Ok(Json(DefinitionsResponse { definitions }))
}

async fn goto_assignment(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DefinitionsResponse>, ApiError> {
    let request: GotoAssignmentRequest = parse(&body)?;
    let query = request.script.query();
    let follow_imports = request.follow_imports;
    let definitions = run_gated(&state, request.script.settings, move |engine| {
        engine.goto_assignments(&query, follow_imports)
    })
    .await?;
    Ok(Json(DefinitionsResponse { definitions }))
}

async fn usages(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DefinitionsResponse>, ApiError> {
    let request: ScriptRequest = parse(&body)?;
    let query = request.query();
    let definitions =
        run_gated(&state, request.settings, move |engine| engine.usages(&query)).await?;
    Ok(Json(DefinitionsResponse { definitions }))
}

async fn names(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DefinitionsResponse>, ApiError> {
    let request: NamesRequest = parse(&body)?;
    let query = request.query();
    let definitions =
        run_gated(&state, request.settings, move |engine| engine.names(&query)).await?;
    Ok(Json(DefinitionsResponse { definitions }))
}

async fn preload_module(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<bool>, ApiError> {
    let request: PreloadModuleRequest = parse(&body)?;
    let modules = request.modules;
    run_gated(&state, request.settings, move |engine| engine.preload_modules(&modules)).await?;
    Ok(Json(true))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Run `f` through the gate on the blocking pool.
///
/// Waiting for the gate blocks a pool thread, never the async workers. A
/// panic in the engine is reported as [`EngineError::Panicked`]; the gate has
/// already restored the baseline settings by then.
async fn run_gated<R, F>(state: &AppState, overrides: EngineSettings, f: F) -> Result<R, ApiError>
where
    R: Send + 'static,
    F: FnOnce(&mut dyn AnalysisEngine) -> Result<R, EngineError> + Send + 'static,
{
    let gate = state.gate.clone();
    let outcome = tokio::task::spawn_blocking(move || gate.with_engine(&overrides, f)).await;
    match outcome {
        Ok(result) => Ok(result?),
        Err(e) if e.is_panic() => Err(EngineError::Panicked(panic_message(e.into_panic())).into()),
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
