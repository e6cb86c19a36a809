// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Base config directory discovery and the file layout below it

use std::io;
use std::path::{Path, PathBuf};

/// Overrides the platform base config directory
pub const CONFIG_DIR_ENV: &str = "BROKK_CONFIG_DIR";

const INSTANCES_DIR: &str = "instances";
const KEY_FILE: &str = "ctl.key";
const SETTINGS_FILE: &str = "ctl.toml";
const WORKTREES_DIR: &str = "worktrees";

/// Locations of control plane files under one base config directory.
///
/// Path accessors are pure; only [`ConfigPaths::ensure_instances_dir_exists`]
/// touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    base: PathBuf,
}

impl ConfigPaths {
    pub fn for_base_config_dir(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Paths under the platform base directory, honoring `BROKK_CONFIG_DIR`
    pub fn defaults() -> Self {
        Self::for_base_config_dir(default_base_config_dir())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.base.join(INSTANCES_DIR)
    }

    pub fn key_path(&self) -> PathBuf {
        self.base.join(KEY_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.base.join(SETTINGS_FILE)
    }

    pub fn worktrees_dir(&self) -> PathBuf {
        self.base.join(WORKTREES_DIR)
    }

    /// Create the instances directory (and parents) if missing.
    pub fn ensure_instances_dir_exists(&self) -> io::Result<PathBuf> {
        let dir = self.instances_dir();
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Platform base config directory
///
/// - `BROKK_CONFIG_DIR` when set and non-empty
/// - macOS: `~/Library/Application Support/Brokk`
/// - Linux: `$XDG_CONFIG_HOME/Brokk` or `~/.config/Brokk`
/// - Windows: `%APPDATA%\Brokk`
pub fn default_base_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(std::env::temp_dir)
        .join("Brokk")
}
