// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid sandbox policy: {}", violations.join("; "))]
    Invalid { violations: Vec<String> },
}

pub type Result<T> = std::result::Result<T, PolicyError>;
