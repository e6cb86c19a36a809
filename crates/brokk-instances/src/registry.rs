// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The `instances/` directory: one `<instanceId>.json` per running instance.

use crate::error::{RegistryError, Result};
use crate::record::{now_ms, InstanceRecord};
use brokk_ctl_config::ConfigPaths;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;

/// Result of reading every entry in the registry directory
#[derive(Debug, Default)]
pub struct RegistryScan {
    /// Number of `.json` files seen, including unreadable ones
    pub total_files: usize,
    pub records: Vec<InstanceRecord>,
    /// File names whose content is not a valid record
    pub parse_failures: Vec<String>,
    /// File names that could not be read
    pub read_failures: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    dir: PathBuf,
}

impl InstanceRegistry {
    pub fn new(paths: &ConfigPaths) -> Self {
        Self::with_dir(paths.instances_dir())
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, instance_id: &str) -> PathBuf {
        self.dir.join(format!("{instance_id}.json"))
    }

    /// Write the record. Readers see either the previous or the new content.
    pub fn register(&self, record: &InstanceRecord) -> Result<PathBuf> {
        if record.instance_id.trim().is_empty() {
            return Err(RegistryError::EmptyInstanceId);
        }
        if record.instance_id.contains(&['/', '\\'][..]) || record.instance_id.starts_with('.') {
            return Err(RegistryError::InvalidInstanceId(record.instance_id.clone()));
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| RegistryError::io(&self.dir, e))?;

        let path = self.entry_path(&record.instance_id);
        let body = serde_json::to_vec_pretty(record)?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| RegistryError::io(&self.dir, e))?;
        tmp.write_all(&body).map_err(|e| RegistryError::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| RegistryError::io(&path, e.error))?;

        tracing::debug!(instance_id = %record.instance_id, path = %path.display(), "registry entry written");
        Ok(path)
    }

    /// Refresh `updated_at` and rewrite the entry
    pub fn heartbeat(&self, record: &mut InstanceRecord) -> Result<()> {
        record.updated_at = now_ms().max(record.updated_at);
        self.register(record).map(|_| ())
    }

    /// Delete the entry. Returns whether a file was removed.
    pub fn remove(&self, instance_id: &str) -> Result<bool> {
        let path = self.entry_path(instance_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(instance_id, "registry entry removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RegistryError::io(path, e)),
        }
    }

    /// Read every `*.json` entry, creating the directory if missing.
    ///
    /// Individual bad files are reported in the scan rather than failing it.
    pub fn scan(&self) -> Result<RegistryScan> {
        std::fs::create_dir_all(&self.dir).map_err(|e| RegistryError::io(&self.dir, e))?;
        let entries = std::fs::read_dir(&self.dir).map_err(|e| RegistryError::io(&self.dir, e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        files.sort();

        let mut scan = RegistryScan {
            total_files: files.len(),
            ..Default::default()
        };

        for path in files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "unreadable registry entry");
                    scan.read_failures.push(name);
                    continue;
                }
            };

            match serde_json::from_str::<InstanceRecord>(&content) {
                Ok(record) => scan.records.push(record),
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "unparseable registry entry");
                    scan.parse_failures.push(name);
                }
            }
        }

        Ok(scan)
    }
}

/// Background task keeping a registry entry fresh.
///
/// [`Heartbeat::stop`] ends the task and removes the entry.
#[derive(Debug)]
pub struct Heartbeat {
    registry: Arc<InstanceRegistry>,
    instance_id: String,
    task: JoinHandle<()>,
}

impl Heartbeat {
    /// Register `record` now and refresh it every `interval`.
    pub fn start(
        registry: Arc<InstanceRegistry>,
        mut record: InstanceRecord,
        interval: Duration,
    ) -> Result<Self> {
        registry.heartbeat(&mut record)?;
        let instance_id = record.instance_id.clone();

        let task_registry = Arc::clone(&registry);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately and the entry was just written
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = task_registry.heartbeat(&mut record) {
                    tracing::warn!(instance_id = %record.instance_id, error = %e, "heartbeat failed");
                }
            }
        });

        Ok(Self {
            registry,
            instance_id,
            task,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub async fn stop(self) -> Result<()> {
        self.task.abort();
        // Wait for an in-flight write to finish so it cannot recreate the entry
        let _ = self.task.await;
        self.registry.remove(&self.instance_id).map(|_| ())
    }
}
