// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! On-disk layout and runtime settings of the Brokk control plane.
//!
//! Everything lives under one base config directory:
//!
//! ```text
//! <base>/
//!   ctl.key          shared control secret
//!   ctl.toml         optional settings file
//!   instances/       one <instanceId>.json per running instance
//!   worktrees/       default per-session workspace root
//! ```

pub mod error;
pub mod paths;
pub mod settings;

pub use error::{Result, SettingsError};
pub use paths::{ConfigPaths, CONFIG_DIR_ENV};
pub use settings::{CtlSettings, ENV_PREFIX};
