// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::error::{ProvisionError, Result};
use crate::git;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Request to provision a workspace for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSpec {
    session_id: Uuid,
    repo_path: PathBuf,
    git_ref: Option<String>,
}

impl SessionSpec {
    /// `git_ref` of `None` (or blank) checks out the repository's `HEAD`.
    pub fn new(
        session_id: Uuid,
        repo_path: impl Into<PathBuf>,
        git_ref: Option<String>,
    ) -> Result<Self> {
        if session_id.is_nil() {
            return Err(ProvisionError::InvalidSession(
                "session id must not be nil".into(),
            ));
        }
        let repo_path = repo_path.into();
        if repo_path.as_os_str().is_empty() {
            return Err(ProvisionError::InvalidSession(
                "repository path must not be empty".into(),
            ));
        }
        let git_ref = git_ref.filter(|r| !r.trim().is_empty());
        if git_ref.as_deref().is_some_and(|r| r.starts_with('-')) {
            return Err(ProvisionError::InvalidSession(
                "git ref must not start with '-'".into(),
            ));
        }
        Ok(Self {
            session_id,
            repo_path,
            git_ref,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn git_ref(&self) -> Option<&str> {
        self.git_ref.as_deref()
    }
}

#[derive(Debug, Clone)]
struct Provisioned {
    repo_path: PathBuf,
    workspace: PathBuf,
}

type SessionSlot = Arc<tokio::sync::Mutex<Option<Provisioned>>>;

/// Creates and removes per-session git worktrees under a base directory
#[derive(Debug)]
pub struct WorktreeProvisioner {
    base_dir: PathBuf,
    git_timeout: Duration,
    sessions: Mutex<HashMap<Uuid, SessionSlot>>,
}

impl WorktreeProvisioner {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        if base_dir.as_os_str().is_empty() {
            return Err(ProvisionError::InvalidBaseDir);
        }
        Ok(Self {
            base_dir,
            git_timeout: DEFAULT_GIT_TIMEOUT,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_git_timeout(mut self, timeout: Duration) -> Self {
        self.git_timeout = timeout;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn workspace_path(&self, session_id: Uuid) -> PathBuf {
        self.base_dir.join(session_id.to_string())
    }

    /// True when the base directory exists and is a directory
    pub fn healthcheck(&self) -> bool {
        self.base_dir.is_dir()
    }

    fn slot(&self, session_id: Uuid) -> SessionSlot {
        let mut sessions = self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(sessions.entry(session_id).or_default())
    }

    /// Drop the session's slot once nothing is provisioned and no other
    /// caller holds it.
    fn release(&self, session_id: Uuid, slot: SessionSlot) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map plus ours
        if Arc::strong_count(&slot) != 2 {
            return;
        }
        let idle = slot.try_lock().map(|state| state.is_none()).unwrap_or(false);
        if idle {
            sessions.remove(&session_id);
        }
    }

    #[cfg(test)]
    fn tracked_sessions(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Provision (or return the existing) workspace for `spec`.
    pub async fn provision(&self, spec: &SessionSpec) -> Result<PathBuf> {
        let slot = self.slot(spec.session_id);
        let result = {
            let mut state = slot.lock().await;
            self.provision_locked(spec, &mut state).await
        };
        self.release(spec.session_id, slot);
        result
    }

    async fn provision_locked(
        &self,
        spec: &SessionSpec,
        state: &mut Option<Provisioned>,
    ) -> Result<PathBuf> {
        if let Some(existing) = state.as_ref() {
            tracing::debug!(session_id = %spec.session_id, "workspace already provisioned");
            return Ok(existing.workspace.clone());
        }

        let workspace = self.workspace_path(spec.session_id);
        if workspace.join(".git").exists() {
            tracing::info!(
                session_id = %spec.session_id,
                workspace = %workspace.display(),
                "adopting existing workspace"
            );
            *state = Some(Provisioned {
                repo_path: spec.repo_path.clone(),
                workspace: workspace.clone(),
            });
            return Ok(workspace);
        }
        if workspace.exists() && !is_empty_dir(&workspace) {
            return Err(ProvisionError::WorkspaceOccupied(workspace));
        }

        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|source| ProvisionError::Io {
                path: self.base_dir.clone(),
                source,
            })?;

        let target = spec.git_ref().unwrap_or("HEAD");
        let added = git::run(
            &spec.repo_path,
            &[
                OsStr::new("worktree"),
                OsStr::new("add"),
                OsStr::new("--detach"),
                workspace.as_os_str(),
                OsStr::new(target),
            ],
            self.git_timeout,
        )
        .await;

        if let Err(e) = added {
            tracing::warn!(session_id = %spec.session_id, error = %e, "worktree add failed, rolling back");
            self.rollback(&spec.repo_path, &workspace).await;
            return Err(e);
        }

        tracing::info!(
            session_id = %spec.session_id,
            workspace = %workspace.display(),
            git_ref = target,
            "workspace provisioned"
        );
        *state = Some(Provisioned {
            repo_path: spec.repo_path.clone(),
            workspace: workspace.clone(),
        });
        Ok(workspace)
    }

    /// Remove the session's workspace. Succeeds when nothing is left to remove.
    pub async fn teardown(&self, session_id: Uuid) -> Result<()> {
        let slot = self.slot(session_id);
        let result = {
            let mut state = slot.lock().await;
            self.teardown_locked(session_id, &mut state).await
        };
        self.release(session_id, slot);
        result
    }

    async fn teardown_locked(
        &self,
        session_id: Uuid,
        state: &mut Option<Provisioned>,
    ) -> Result<()> {
        let workspace = self.workspace_path(session_id);

        let repo = match state.take() {
            Some(provisioned) => Some(provisioned.repo_path),
            None => source_repo(&workspace),
        };

        if let Some(repo) = &repo {
            if workspace.exists() {
                let removed = git::run(
                    repo,
                    &[
                        OsStr::new("worktree"),
                        OsStr::new("remove"),
                        OsStr::new("--force"),
                        workspace.as_os_str(),
                    ],
                    self.git_timeout,
                )
                .await;
                if let Err(e) = removed {
                    tracing::warn!(%session_id, error = %e, "git worktree remove failed, deleting directory");
                }
            }
        }

        remove_dir_if_exists(&workspace).await?;

        if let Some(repo) = &repo {
            self.prune(repo).await;
        }

        tracing::info!(%session_id, "workspace torn down");
        Ok(())
    }

    async fn rollback(&self, repo: &Path, workspace: &Path) {
        if let Err(e) = remove_dir_if_exists(workspace).await {
            tracing::warn!(workspace = %workspace.display(), error = %e, "rollback cleanup failed");
        }
        self.prune(repo).await;
    }

    async fn prune(&self, repo: &Path) {
        let pruned = git::run(
            repo,
            &[OsStr::new("worktree"), OsStr::new("prune")],
            self.git_timeout,
        )
        .await;
        if let Err(e) = pruned {
            tracing::debug!(repo = %repo.display(), error = %e, "git worktree prune failed");
        }
    }
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).map(|mut entries| entries.next().is_none()).unwrap_or(false)
}

async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ProvisionError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Source repository of a linked worktree, read from its `.git` file
/// (`gitdir: <repo>/.git/worktrees/<name>`). Bare repositories yield the
/// repository directory itself.
fn source_repo(workspace: &Path) -> Option<PathBuf> {
    let content = std::fs::read_to_string(workspace.join(".git")).ok()?;
    let gitdir = PathBuf::from(content.trim().strip_prefix("gitdir:")?.trim());
    let common = gitdir.parent()?.parent()?;
    match common.file_name() {
        Some(name) if name == ".git" => common.parent().map(Path::to_path_buf),
        _ => Some(common.to_path_buf()),
    }
}
