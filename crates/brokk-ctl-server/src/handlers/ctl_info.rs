// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Instance introspection

use crate::state::AppState;
use crate::SUPPORTED_CAPABILITIES;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtlInfo {
    pub instance_id: String,
    pub pid: Option<u32>,
    pub listen_addr: String,
    pub projects: Vec<PathBuf>,
    pub brokkctl_version: String,
    pub app_version: String,
    pub supported_capabilities: Vec<String>,
}

/// `GET /v1/ctl-info`
pub async fn ctl_info(State(state): State<AppState>) -> Json<CtlInfo> {
    let instance = &state.instance;
    Json(CtlInfo {
        instance_id: instance.instance_id.clone(),
        pid: instance.pid,
        listen_addr: state.listen_addr(),
        projects: instance.projects.clone(),
        brokkctl_version: instance.brokkctl_version.clone(),
        app_version: instance.app_version.clone(),
        supported_capabilities: SUPPORTED_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
    })
}
