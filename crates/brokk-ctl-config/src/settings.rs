// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Layered runtime settings for the control plane host.
//!
//! Layers, lowest precedence first: built-in defaults, `<base>/ctl.toml`,
//! `BROKK_CTL_*` environment variables. Command-line flags are applied on
//! top by the binaries. Objects merge recursively; arrays and scalars from a
//! higher layer replace the lower one.

use crate::error::{Result, SettingsError};
use crate::paths::ConfigPaths;
use brokk_sandbox_policy::SandboxPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value as J;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables overriding settings, e.g. `BROKK_CTL_PORT`
pub const ENV_PREFIX: &str = "BROKK_CTL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CtlSettings {
    /// Control server port on 127.0.0.1, 0 picks an ephemeral port
    pub port: u16,
    /// Project roots advertised by this instance
    pub projects: Vec<PathBuf>,
    /// Root for per-session worktrees, defaults to `<base>/worktrees`
    pub worktree_base_dir: Option<PathBuf>,
    pub git_timeout_secs: u64,
    pub heartbeat_interval_ms: u64,
    pub sandbox: SandboxPolicy,
}

impl Default for CtlSettings {
    fn default() -> Self {
        Self {
            port: 0,
            projects: Vec::new(),
            worktree_base_dir: None,
            git_timeout_secs: 120,
            heartbeat_interval_ms: 300,
            sandbox: SandboxPolicy::default(),
        }
    }
}

impl CtlSettings {
    /// Load `<base>/ctl.toml` (if present) and the environment overlay
    pub fn load(paths: &ConfigPaths) -> Result<Self> {
        Self::load_from(Some(&paths.settings_path()))
    }

    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        if let Some(layer) = file.map(read_file_layer).transpose()?.flatten() {
            merge_two_json(&mut merged, layer);
        }
        merge_two_json(&mut merged, env_overlay()?);

        let settings: Self = serde_json::from_value(merged)?;
        settings.sandbox.validate()?;
        tracing::debug!(?settings, "settings loaded");
        Ok(settings)
    }

    pub fn worktree_base_dir(&self, paths: &ConfigPaths) -> PathBuf {
        self.worktree_base_dir.clone().unwrap_or_else(|| paths.worktrees_dir())
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

fn read_file_layer(path: &Path) -> Result<Option<J>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let value: toml::Value = toml::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(serde_json::to_value(value)?))
}

/// JSON overlay from `BROKK_CTL_*` variables; `BROKK_CTL_GIT_TIMEOUT_SECS`
/// maps to `git-timeout-secs` and `BROKK_CTL_PROJECTS` is comma separated.
fn env_overlay() -> Result<J> {
    let built = config::Config::builder()
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .convert_case(config::Case::Kebab)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("projects"),
        )
        .build()?;

    Ok(serde_json::to_value(
        built.try_deserialize::<serde_json::Map<String, J>>()?,
    )?)
}

fn merge_two_json(base: &mut J, layer: J) {
    match (base, layer) {
        (J::Object(a), J::Object(b)) => {
            for (k, v) in b {
                merge_two_json(a.entry(k).or_insert(J::Null), v);
            }
        }
        (_, J::Null) => {}
        (a, b) => *a = b,
    }
}
