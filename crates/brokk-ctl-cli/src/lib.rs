// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! brokkctl: command-line client for running Brokk instances.
//!
//! Results go to stdout as JSON, diagnostics to stderr, and the process
//! exit code tells scripts what went wrong (see [`CtlExitCode`]).

pub mod error;
pub mod info;
pub mod instances;

pub use clap::Parser;
pub use error::{CliError, CtlExitCode};

use brokk_ctl_config::ConfigPaths;
use brokk_logging::CliLoggingArgs;
use clap::Subcommand;
use std::io::Write;
use std::path::PathBuf;

#[derive(clap::Parser, Debug)]
#[command(
    name = "brokkctl",
    about = "Discover and query running Brokk instances",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Base config directory shared with the instances
    #[arg(long, env = "BROKK_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(flatten)]
    pub logging: CliLoggingArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect the instance registry
    Instances {
        #[command(subcommand)]
        subcommand: instances::InstancesCommands,
    },
    /// Show control information for one instance
    Info(info::InfoArgs),
}

impl Cli {
    pub fn config_paths(&self) -> ConfigPaths {
        match &self.config_dir {
            Some(dir) if !dir.as_os_str().is_empty() => ConfigPaths::for_base_config_dir(dir),
            _ => ConfigPaths::defaults(),
        }
    }

    /// Run the selected command, writing results to `out`
    pub async fn run(&self, out: &mut impl Write) -> Result<CtlExitCode, CliError> {
        let paths = self.config_paths();
        match &self.command {
            Commands::Instances { subcommand } => subcommand.run(&paths, out),
            Commands::Info(args) => args.run(&paths, out).await,
        }
    }
}
