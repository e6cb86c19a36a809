// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Server error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;

/// Errors returned to HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("not implemented")]
    NotImplemented,

    #[error("provisioner unhealthy: {0}")]
    ProvisionerUnhealthy(String),

    /// Detail is logged, never sent to the client
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ApiError::ProvisionerUnhealthy(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            ApiError::Unauthorized => json!({ "error": "unauthorized" }),
            ApiError::BadRequest(message) => json!({ "error": "bad_request", "message": message }),
            ApiError::NotFound => json!({ "error": "not_found" }),
            ApiError::NotImplemented => json!({ "error": "not_implemented" }),
            ApiError::ProvisionerUnhealthy(message) => {
                json!({ "error": "provisioner_unhealthy", "message": message })
            }
            ApiError::Internal(_) => {
                json!({ "error": "internal", "message": "internal server error" })
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

/// Lifecycle and startup failures of [`crate::ControlServer`]
#[derive(Debug, thiserror::Error)]
pub enum ControlServerError {
    #[error("control server already started")]
    AlreadyStarted,

    #[error("control server was stopped and cannot be restarted")]
    Stopped,

    #[error("refusing to bind non-loopback address {0}")]
    NonLoopback(SocketAddr),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("control key unavailable: {0}")]
    Key(#[from] brokk_ctl_keys::KeyError),
}
