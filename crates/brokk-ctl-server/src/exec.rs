// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Execution management behind the `/v1/exec` routes

use async_trait::async_trait;
use brokk_sandbox_policy::{is_supported_platform, Platform, PolicyError, SandboxPolicy};
use brokk_worktree::{ProvisionError, SessionSpec, WorktreeProvisioner};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecStartRequest {
    /// Generated when absent
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub repo_path: PathBuf,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxStatus {
    pub platform: Platform,
    /// Whether the platform can enforce the sandbox policy
    pub enforced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecStarted {
    pub session_id: Uuid,
    pub workspace_path: PathBuf,
    pub sandbox: SandboxStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

/// Starts and stops agent executions for the control server
#[async_trait]
pub trait ExecutionManager: Send + Sync {
    async fn start(&self, request: ExecStartRequest) -> Result<ExecStarted, ExecError>;

    /// Stop the session and release its workspace. Stopping an unknown
    /// session succeeds.
    async fn stop(&self, session_id: Uuid) -> Result<(), ExecError>;

    /// Readiness of the resources executions depend on
    fn healthcheck(&self) -> bool;
}

/// Execution manager that gives every session its own git worktree and
/// reports whether the sandbox policy can be enforced on this platform.
#[derive(Debug)]
pub struct ProvisioningExecManager {
    provisioner: Arc<WorktreeProvisioner>,
    policy: SandboxPolicy,
    platform: Platform,
}

impl ProvisioningExecManager {
    /// Fails when the policy is not well formed
    pub fn new(
        provisioner: Arc<WorktreeProvisioner>,
        policy: SandboxPolicy,
    ) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self {
            provisioner,
            policy,
            platform: Platform::current(),
        })
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }
}

#[async_trait]
impl ExecutionManager for ProvisioningExecManager {
    async fn start(&self, request: ExecStartRequest) -> Result<ExecStarted, ExecError> {
        if !request.repo_path.is_absolute() {
            return Err(ExecError::InvalidRequest(format!(
                "repoPath must be absolute: {}",
                request.repo_path.display()
            )));
        }

        let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);
        let spec = SessionSpec::new(session_id, request.repo_path, request.git_ref)?;
        let workspace_path = self.provisioner.provision(&spec).await?;

        let enforced = is_supported_platform(self.platform);
        if !enforced {
            tracing::warn!(
                %session_id,
                platform = %self.platform,
                "sandbox enforcement unavailable on this platform"
            );
        }

        Ok(ExecStarted {
            session_id,
            workspace_path,
            sandbox: SandboxStatus {
                platform: self.platform,
                enforced,
            },
        })
    }

    async fn stop(&self, session_id: Uuid) -> Result<(), ExecError> {
        self.provisioner.teardown(session_id).await?;
        Ok(())
    }

    fn healthcheck(&self) -> bool {
        self.provisioner.healthcheck()
    }
}
