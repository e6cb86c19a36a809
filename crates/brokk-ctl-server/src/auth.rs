// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Shared-secret authentication

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub use brokk_ctl_keys::CTL_KEY_HEADER;

/// Reject any request whose `Brokk-CTL-Key` header does not match the
/// control secret. The comparison is constant time.
pub async fn auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let expected = match state.keys.load_or_create_key() {
        Ok(key) => key,
        Err(e) => return ApiError::Internal(format!("control key unavailable: {e}")).into_response(),
    };

    let verdict = req
        .headers()
        .get(CTL_KEY_HEADER)
        .map(|value| expected.verify(value.as_bytes()));

    match verdict {
        Some(true) => next.run(req).await,
        Some(false) => {
            tracing::warn!(path = %req.uri().path(), "rejected request with invalid control key");
            ApiError::Unauthorized.into_response()
        }
        None => {
            tracing::warn!(path = %req.uri().path(), "rejected request without control key");
            ApiError::Unauthorized.into_response()
        }
    }
}
