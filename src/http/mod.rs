//! HTTP front end.
//!
//! JSON over `POST`, one route per engine operation. Every route sits behind
//! the [`pipeline`] layer, which authenticates requests, records activity
//! and signs responses.

pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use protocol::{
    CompletionsResponse, DefinitionsResponse, ErrorBody, GotoAssignmentRequest, NamesRequest,
    PreloadModuleRequest, ScriptRequest,
};
pub use routes::{router, serve};
pub use state::AppState;
