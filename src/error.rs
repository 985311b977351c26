// src/error.rs

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Errors raised by the policy registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed agent id, path or rule payload. Never reaches the network.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Transient network failure talking to an agent; retried by reconciliation
    #[error("agent {agent_id} unreachable: {reason}")]
    AgentUnreachable { agent_id: String, reason: String },

    /// Agent answered but refused the snapshot; not retried automatically
    #[error("agent {agent_id} rejected policy update (status {status}): {reason}")]
    AgentRejected {
        agent_id: String,
        status: u16,
        reason: String,
    },

    /// Internal invariant break in the policy store
    #[error("store concurrency violation: {0}")]
    StoreConcurrencyViolation(String),

    /// Process-level I/O (binding or serving the admin API)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Stable code used in API error envelopes
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::InvalidArgument(_) => "INVALID_ARGUMENT",
            RegistryError::AgentUnreachable { .. } => "AGENT_UNREACHABLE",
            RegistryError::AgentRejected { .. } => "AGENT_REJECTED",
            RegistryError::StoreConcurrencyViolation(_) => "STORE_CONCURRENCY_VIOLATION",
            RegistryError::Io(_) => "IO_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::AgentUnreachable { .. })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RegistryError::AgentUnreachable { .. } | RegistryError::AgentRejected { .. } => {
                StatusCode::BAD_GATEWAY
            }
            RegistryError::StoreConcurrencyViolation(_) | RegistryError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = Json(json!({
            "success": false,
            "data": null,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            },
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
