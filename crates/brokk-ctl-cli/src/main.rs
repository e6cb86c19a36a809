// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use brokk_ctl_cli::{Cli, CtlExitCode, Parser};
use brokk_logging::{CliLogLevel, ConsoleStream};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                CtlExitCode::UserError.into()
            } else {
                CtlExitCode::Success.into()
            };
        }
    };

    // stdout carries the JSON result
    if let Err(e) = cli.logging.init("brokkctl", ConsoleStream::Stderr, CliLogLevel::Warn) {
        eprintln!("brokkctl: failed to initialize logging: {e:#}");
        return CtlExitCode::Failure.into();
    }

    let mut stdout = std::io::stdout().lock();
    match cli.run(&mut stdout).await {
        Ok(code) => code.into(),
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("brokkctl: {e}");
            e.exit_code().into()
        }
    }
}
