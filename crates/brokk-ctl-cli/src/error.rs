// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use brokk_ctl_keys::KeyError;
use brokk_instances::RegistryError;
use std::path::PathBuf;
use thiserror::Error;

/// Process exit codes shared by all `brokkctl` commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CtlExitCode {
    Success = 0,
    /// Unexpected local failure
    Failure = 1,
    /// Bad selection or arguments
    UserError = 2,
    /// Output produced but some registry entries could not be parsed
    PartialSuccess = 3,
    /// Registry unreadable or instance unreachable
    TransportError = 4,
    Unauthorized = 5,
    ServerError = 6,
    MissingKey = 7,
}

impl CtlExitCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<CtlExitCode> for std::process::ExitCode {
    fn from(code: CtlExitCode) -> Self {
        std::process::ExitCode::from(code.code())
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Selection(RegistryError),

    #[error("failed to list instances directory: {0}")]
    Registry(RegistryError),

    #[error("no control key at {0}; has an instance been started with this config dir?")]
    MissingKey(PathBuf),

    #[error("failed to read control key: {0}")]
    Key(#[from] KeyError),

    #[error("instance {instance_id} at {addr} is unreachable: {source}")]
    Unreachable {
        instance_id: String,
        addr: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("control key rejected by instance {instance_id} at {addr}")]
    Unauthorized { instance_id: String, addr: String },

    #[error("instance {instance_id} at {addr} answered {status}: {body}")]
    Server {
        instance_id: String,
        addr: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<RegistryError> for CliError {
    fn from(err: RegistryError) -> Self {
        if err.is_user_error() {
            CliError::Selection(err)
        } else {
            CliError::Registry(err)
        }
    }
}

impl CliError {
    pub fn exit_code(&self) -> CtlExitCode {
        match self {
            CliError::Selection(_) => CtlExitCode::UserError,
            CliError::Registry(_) => CtlExitCode::TransportError,
            CliError::MissingKey(_) | CliError::Key(_) => CtlExitCode::MissingKey,
            CliError::Unreachable { .. } | CliError::Http(_) => CtlExitCode::TransportError,
            CliError::Unauthorized { .. } => CtlExitCode::Unauthorized,
            CliError::Server { .. } => CtlExitCode::ServerError,
            CliError::Output(_) | CliError::Encode(_) => CtlExitCode::Failure,
        }
    }
}
