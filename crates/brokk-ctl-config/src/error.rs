// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read settings from environment: {0}")]
    Environment(#[from] config::ConfigError),

    #[error("invalid settings: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error(transparent)]
    Policy(#[from] brokk_sandbox_policy::PolicyError),
}

pub type Result<T> = std::result::Result<T, SettingsError>;
