// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `brokkctl instances` commands

use crate::error::{CliError, CtlExitCode};
use brokk_ctl_config::ConfigPaths;
use brokk_instances::{list_instances, InstanceRegistry, ListOptions, DEFAULT_TTL_MS};
use clap::{Args, Subcommand};
use std::io::Write;

/// Instance selection flags shared by every command that targets instances
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Entries not refreshed within this many milliseconds are stale
    #[arg(long = "ttl", value_name = "MS", default_value_t = DEFAULT_TTL_MS)]
    pub ttl_ms: i64,

    /// Include stale instances
    #[arg(long)]
    pub all: bool,

    /// Comma separated instance ids to select
    #[arg(long, value_name = "IDS")]
    pub instance: Option<String>,

    /// Fail unless exactly one instance is a candidate
    #[arg(long)]
    pub auto_select: bool,

    /// Echoed back as `requestId` in the output
    #[arg(long, value_name = "ID")]
    pub request_id: Option<String>,
}

impl SelectionArgs {
    pub fn to_options(&self) -> ListOptions {
        ListOptions {
            ttl_ms: self.ttl_ms,
            include_all: self.all,
            selector: self.instance.clone(),
            auto_select: self.auto_select,
            request_id: self.request_id.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum InstancesCommands {
    /// List instances registered under the config directory
    List(SelectionArgs),
}

impl InstancesCommands {
    pub fn run(&self, paths: &ConfigPaths, out: &mut impl Write) -> Result<CtlExitCode, CliError> {
        match self {
            InstancesCommands::List(args) => list(paths, args, out),
        }
    }
}

/// Print the listing envelope as one JSON line.
///
/// Unreadable entries take precedence over unparsable ones when choosing the
/// exit code; the envelope is printed either way.
pub fn list(
    paths: &ConfigPaths,
    args: &SelectionArgs,
    out: &mut impl Write,
) -> Result<CtlExitCode, CliError> {
    let registry = InstanceRegistry::new(paths);
    let envelope = list_instances(&registry, &args.to_options())?;

    tracing::debug!(
        dir = %registry.dir().display(),
        returned = envelope.summary.returned_instances,
        total = envelope.summary.total_instances,
        "listed instances"
    );

    serde_json::to_writer(&mut *out, &envelope)?;
    writeln!(out)?;

    Ok(if envelope.has_read_failures() {
        CtlExitCode::TransportError
    } else if envelope.has_parse_failures() {
        CtlExitCode::PartialSuccess
    } else {
        CtlExitCode::Success
    })
}
