//! Shared error types for the application
//!
//! Defines a narrow error taxonomy: one component enum per subsystem,
//! aggregated into `CoreError` via `#[from]`, with a single `IntoResponse`
//! impl mapping error kind to HTTP status at the boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Library scanner errors
#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(String),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("nfo parse error: {0}")]
    NfoParse(String),
}

/// Job queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("duplicate job for dedupe key: {0}")]
    Duplicate(String),

    #[error("invalid state transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Translation pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source subtitle not found: {0}")]
    SourceNotFound(String),

    #[error("subtitle codec error: {0}")]
    Codec(String),

    #[error("term map error: {0}")]
    TermMap(#[from] TermMapError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// LLM agent loop errors
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed tool call: {0}")]
    MalformedToolCall(String),

    #[error("max turns exceeded ({0})")]
    MaxTurnsExceeded(usize),

    #[error("batch validation failed: {0}")]
    ValidationFailed(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentError::Timeout(err.to_string())
        } else {
            AgentError::Transport(err.to_string())
        }
    }
}

/// Term-map subsystem errors
#[derive(Debug, Error)]
pub enum TermMapError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock held by another process: {0}")]
    Locked(String),

    #[error("malformed term map json: {0}")]
    MalformedJson(String),

    #[error("generation failed: {0}")]
    GenerationFailed(#[from] AgentError),
}

/// Web-search provider errors (A3). Tool-execution errors are caught at the
/// agent loop boundary and recorded as `ToolCallRecord{is_error:true}`
/// rather than propagated, so this never joins `CoreError`.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout(err.to_string())
        } else {
            SearchError::Transport(err.to_string())
        }
    }
}

/// Persistence store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".into()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Top-level application error, the boundary between internal errors and HTTP responses.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("scanner error: {0}")]
    Scanner(#[from] ScannerError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("term map error: {0}")]
    TermMap(#[from] TermMapError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    fn status(&self) -> StatusCode {
        match self {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Queue(QueueError::NotFound(_)) => StatusCode::NOT_FOUND,
            CoreError::Queue(QueueError::Duplicate(_)) => StatusCode::CONFLICT,
            CoreError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            CoreError::Scanner(ScannerError::SourceNotFound(_)) => StatusCode::NOT_FOUND,
            CoreError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
