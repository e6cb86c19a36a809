// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Readiness endpoint

use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// `GET /v1/health/ready`
///
/// Ready when the execution manager's resources are usable, or when no
/// execution manager is configured.
pub async fn ready(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    if let Some(exec) = &state.exec {
        if !exec.healthcheck() {
            return Err(ApiError::ProvisionerUnhealthy(
                "workspace provisioner base directory is unavailable".to_string(),
            ));
        }
    }
    Ok(Json(json!({ "status": "ready" })))
}
