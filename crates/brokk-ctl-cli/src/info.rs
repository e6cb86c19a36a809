// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `brokkctl info`: query `GET /v1/ctl-info` on one instance

use crate::error::{CliError, CtlExitCode};
use crate::instances::SelectionArgs;
use brokk_ctl_config::ConfigPaths;
use brokk_ctl_keys::{CtlKey, KeyManager, CTL_KEY_HEADER};
use brokk_instances::{list_instances, InstanceRegistry, InstanceView, RegistryError};
use brokk_logging::redact;
use clap::Args;
use reqwest::StatusCode;
use serde_json::Value;
use std::io::Write;
use std::time::Duration;

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Request timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 5000)]
    pub timeout_ms: u64,
}

impl InfoArgs {
    pub async fn run(&self, paths: &ConfigPaths, out: &mut impl Write) -> Result<CtlExitCode, CliError> {
        let instance = select_instance(paths, &self.selection)?;

        let keys = KeyManager::new(paths);
        let key = keys
            .read_key()?
            .ok_or_else(|| CliError::MissingKey(keys.key_path().to_path_buf()))?;

        let info = fetch_ctl_info(&instance, &key, Duration::from_millis(self.timeout_ms)).await?;
        serde_json::to_writer(&mut *out, &info)?;
        writeln!(out)?;
        Ok(CtlExitCode::Success)
    }
}

/// Resolve exactly one target instance. Without `--instance` the single
/// live instance is chosen automatically.
pub fn select_instance(
    paths: &ConfigPaths,
    selection: &SelectionArgs,
) -> Result<InstanceView, CliError> {
    let mut options = selection.to_options();
    if options.selector.is_none() {
        options.auto_select = true;
    }

    let registry = InstanceRegistry::new(paths);
    let envelope = list_instances(&registry, &options)?;
    let count = envelope.instances.len();
    let mut instances = envelope.instances.into_iter();
    match (instances.next(), count) {
        (Some(instance), 1) => Ok(instance),
        _ => Err(RegistryError::Ambiguous(count).into()),
    }
}

/// Call the control endpoint of `instance` with the shared key
pub async fn fetch_ctl_info(
    instance: &InstanceView,
    key: &CtlKey,
    timeout: Duration,
) -> Result<Value, CliError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let url = format!("http://{}/v1/ctl-info", instance.listen_addr);
    tracing::debug!(
        instance_id = %instance.instance_id,
        %url,
        key = %redact(key.as_str()),
        "requesting ctl-info"
    );

    let response = client
        .get(&url)
        .header(CTL_KEY_HEADER, key.as_str())
        .send()
        .await
        .map_err(|source| {
            if source.is_connect() || source.is_timeout() {
                CliError::Unreachable {
                    instance_id: instance.instance_id.clone(),
                    addr: instance.listen_addr.clone(),
                    source,
                }
            } else {
                CliError::Http(source)
            }
        })?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(CliError::Unauthorized {
            instance_id: instance.instance_id.clone(),
            addr: instance.listen_addr.clone(),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CliError::Server {
            instance_id: instance.instance_id.clone(),
            addr: instance.listen_addr.clone(),
            status,
            body,
        });
    }

    Ok(response.json::<Value>().await?)
}
