// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Brokk control server
//!
//! An HTTP service bound to loopback that lets `brokkctl` and other local
//! tools introspect and drive a running instance. Every request must carry
//! the shared secret in the `Brokk-CTL-Key` header.

pub mod auth;
pub mod config;
pub mod error;
pub mod exec;
pub mod handlers;
pub mod server;
pub mod state;

pub use auth::CTL_KEY_HEADER;
pub use config::ServerConfig;
pub use error::{ApiError, ControlServerError};
pub use exec::{
    ExecError, ExecStartRequest, ExecStarted, ExecutionManager, ProvisioningExecManager,
    SandboxStatus,
};
pub use server::ControlServer;
pub use state::AppState;

/// Capabilities advertised by `GET /v1/ctl-info`
pub const SUPPORTED_CAPABILITIES: &[&str] = &["ctl.info", "health.ready", "exec.start", "exec.stop"];
