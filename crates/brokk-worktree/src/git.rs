// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::error::{ProvisionError, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Run `git -C <dir> <args>` and return trimmed stdout.
///
/// The child is killed when the timeout elapses.
pub(crate) async fn run(dir: &Path, args: &[&OsStr], timeout: Duration) -> Result<String> {
    let command = describe(dir, args);

    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(%command, "running git");

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => return Err(ProvisionError::Timeout { command, timeout }),
        Ok(Err(source)) => return Err(ProvisionError::Spawn { command, source }),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        return Err(ProvisionError::Git {
            command,
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn describe(dir: &Path, args: &[&OsStr]) -> String {
    let mut parts = vec![format!("git -C {}", dir.display())];
    parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}
