// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode instance record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("instance id must not be empty")]
    EmptyInstanceId,

    #[error("instance id is not a valid file name: {0}")]
    InvalidInstanceId(String),

    #[error("no instances matched selector: {0}")]
    NoMatch(String),

    #[error("auto-select ambiguous: found {0} candidate instances")]
    Ambiguous(usize),
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Selection problems are the caller's fault rather than the registry's
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::NoMatch(_) | Self::Ambiguous(_))
    }
}
