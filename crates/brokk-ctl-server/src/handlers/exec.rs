// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Execution start and stop

use crate::error::ApiError;
use crate::exec::{ExecError, ExecStartRequest, ExecStarted, ExecutionManager};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use brokk_worktree::ProvisionError;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

fn manager(state: &AppState) -> Result<Arc<dyn ExecutionManager>, ApiError> {
    state.exec.clone().ok_or(ApiError::NotImplemented)
}

impl From<ExecError> for ApiError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::InvalidRequest(message) => ApiError::BadRequest(message),
            ExecError::Provision(ProvisionError::InvalidSession(message)) => {
                ApiError::BadRequest(message)
            }
            ExecError::Provision(other) => ApiError::Internal(other.to_string()),
        }
    }
}

/// `POST /v1/exec/start`
pub async fn start(
    State(state): State<AppState>,
    body: Result<Json<ExecStartRequest>, JsonRejection>,
) -> Result<Json<ExecStarted>, ApiError> {
    let exec = manager(&state)?;
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let started = exec.start(request).await?;
    tracing::info!(
        session_id = %started.session_id,
        workspace = %started.workspace_path.display(),
        "execution started"
    );
    Ok(Json(started))
}

/// `POST /v1/exec/:session_id/stop`
pub async fn stop(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let exec = manager(&state)?;
    let session_id = Uuid::parse_str(&session_id)
        .map_err(|e| ApiError::BadRequest(format!("invalid session id: {e}")))?;

    exec.stop(session_id).await?;
    tracing::info!(%session_id, "execution stopped");
    Ok(Json(json!({ "sessionId": session_id, "status": "stopped" })))
}
