// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Isolated git worktrees for agent sessions.
//!
//! Each session gets a detached worktree at `<base_dir>/<sessionId>` that
//! shares history with the source repository. Provisioning and teardown are
//! idempotent, and operations on one session are serialized.

pub mod error;
mod git;
pub mod provisioner;

pub use error::{ProvisionError, Result};
pub use provisioner::{SessionSpec, WorktreeProvisioner, DEFAULT_GIT_TIMEOUT};
