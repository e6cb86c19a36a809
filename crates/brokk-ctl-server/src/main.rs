// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Headless Brokk instance host
//!
//! Starts the control server, registers the instance for discovery and keeps
//! the registry entry fresh until Ctrl-C.

use anyhow::Context;
use brokk_ctl_config::{ConfigPaths, CtlSettings};
use brokk_ctl_keys::KeyManager;
use brokk_ctl_server::{ControlServer, ProvisioningExecManager, ServerConfig};
use brokk_instances::{Heartbeat, InstanceRecord, InstanceRegistry};
use brokk_logging::{CliLogLevel, CliLoggingArgs, ConsoleStream};
use brokk_worktree::WorktreeProvisioner;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base config directory (defaults to the platform location)
    #[arg(long, env = "BROKK_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Control server port on 127.0.0.1 (0 picks a free port)
    #[arg(long)]
    port: Option<u16>,

    /// Project root advertised by this instance (repeatable)
    #[arg(long = "project")]
    projects: Vec<PathBuf>,

    /// Directory for per-session worktrees
    #[arg(long)]
    worktree_base_dir: Option<PathBuf>,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.logging
        .init("brokk-ctl-server", ConsoleStream::Stdout, CliLogLevel::Info)?;

    let paths = match &args.config_dir {
        Some(dir) => ConfigPaths::for_base_config_dir(dir),
        None => ConfigPaths::defaults(),
    };

    let mut settings = CtlSettings::load(&paths)
        .with_context(|| format!("loading {}", paths.settings_path().display()))?;
    if let Some(port) = args.port {
        settings.port = port;
    }
    if !args.projects.is_empty() {
        settings.projects = args.projects.clone();
    }
    if args.worktree_base_dir.is_some() {
        settings.worktree_base_dir = args.worktree_base_dir.clone();
    }

    let keys = Arc::new(KeyManager::new(&paths));
    keys.load_or_create_key()
        .with_context(|| format!("preparing control key at {}", paths.key_path().display()))?;

    let worktree_base = settings.worktree_base_dir(&paths);
    std::fs::create_dir_all(&worktree_base)
        .with_context(|| format!("creating worktree directory {}", worktree_base.display()))?;
    let provisioner = Arc::new(
        WorktreeProvisioner::new(&worktree_base)?.with_git_timeout(settings.git_timeout()),
    );
    let exec = ProvisioningExecManager::new(provisioner, settings.sandbox.clone())
        .context("invalid sandbox policy")?;

    let record = InstanceRecord::for_current_process(
        settings.projects.clone(),
        env!("CARGO_PKG_VERSION"),
    );
    let server = ControlServer::new(
        ServerConfig::loopback(settings.port),
        record.clone(),
        Arc::clone(&keys),
    )
    .with_exec_manager(Arc::new(exec));

    let addr = server.start().await.context("starting control server")?;

    let registry = Arc::new(InstanceRegistry::new(&paths));
    let heartbeat = Heartbeat::start(
        registry,
        record.with_listen_addr(addr.to_string()),
        settings.heartbeat_interval(),
    )
    .context("registering instance")?;

    tracing::info!(
        instance_id = heartbeat.instance_id(),
        %addr,
        config_dir = %paths.base_dir().display(),
        "instance ready"
    );

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    tracing::info!("shutting down");

    if let Err(e) = heartbeat.stop().await {
        tracing::warn!(error = %e, "failed to remove registry entry");
    }
    server.shutdown().await;
    Ok(())
}
