// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Listing and selecting instances from the registry

use crate::error::{RegistryError, Result};
use crate::record::{now_ms, InstanceRecord};
use crate::registry::InstanceRegistry;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

pub const DEFAULT_TTL_MS: i64 = 1000;
pub const AUTO_REQUEST_ID: &str = "(auto)";

#[derive(Debug, Clone)]
pub struct ListOptions {
    pub ttl_ms: i64,
    /// Include stale instances (marked `"status":"stale"`)
    pub include_all: bool,
    /// Comma separated instance ids
    pub selector: Option<String>,
    /// Require exactly one candidate and return only it
    pub auto_select: bool,
    pub request_id: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            include_all: false,
            selector: None,
            auto_select: false,
            request_id: None,
        }
    }
}

impl ListOptions {
    fn selector_ids(&self) -> Option<Vec<String>> {
        let raw = self.selector.as_deref()?;
        let mut ids: Vec<String> = Vec::new();
        for id in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }
        (!ids.is_empty()).then_some(ids)
    }
}

/// One instance as reported by `brokkctl instances list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceView {
    pub instance_id: String,
    pub pid: Option<u32>,
    pub listen_addr: String,
    pub projects: Vec<PathBuf>,
    pub brokkctl_version: String,
    pub started_at: i64,
    pub last_seen_ms: i64,
    pub stale: bool,
    pub status: &'static str,
}

impl InstanceView {
    fn from_record(record: InstanceRecord, now: i64, ttl_ms: i64) -> Self {
        let stale = record.is_stale(now, ttl_ms);
        Self {
            instance_id: record.instance_id,
            pid: record.pid,
            listen_addr: record.listen_addr,
            projects: record.projects,
            brokkctl_version: record.brokkctl_version,
            started_at: record.created_at,
            last_seen_ms: record.updated_at,
            stale,
            status: if stale { "stale" } else { "ok" },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub total_instances: usize,
    pub returned_instances: usize,
    pub stale_instances: usize,
    pub ttl_ms: i64,
    pub parse_failures: usize,
    pub read_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFiles {
    pub parse_failures: Vec<String>,
    pub read_failures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEnvelope {
    pub request_id: String,
    pub summary: ListSummary,
    pub instances: Vec<InstanceView>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_files: Option<SkippedFiles>,
}

impl ListEnvelope {
    pub fn has_read_failures(&self) -> bool {
        self.summary.read_failures > 0
    }

    pub fn has_parse_failures(&self) -> bool {
        self.summary.parse_failures > 0
    }
}

/// List instances using the current clock
pub fn list_instances(registry: &InstanceRegistry, options: &ListOptions) -> Result<ListEnvelope> {
    list_instances_at(registry, options, now_ms())
}

/// List instances as of `now` (epoch millis).
///
/// Results are sorted by instance id. Stale instances are counted but only
/// returned with `include_all`. A selector that matches nothing and an
/// ambiguous auto-select are errors.
pub fn list_instances_at(
    registry: &InstanceRegistry,
    options: &ListOptions,
    now: i64,
) -> Result<ListEnvelope> {
    let started = Instant::now();
    let scan = registry.scan()?;

    let mut views: Vec<InstanceView> = scan
        .records
        .into_iter()
        .map(|record| InstanceView::from_record(record, now, options.ttl_ms))
        .collect();
    views.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));

    let stale_instances = views.iter().filter(|v| v.stale).count();
    let candidates: Vec<InstanceView> = if options.include_all {
        views
    } else {
        views.into_iter().filter(|v| !v.stale).collect()
    };

    let instances = if let Some(ids) = options.selector_ids() {
        let selected: Vec<InstanceView> = candidates
            .into_iter()
            .filter(|v| ids.contains(&v.instance_id))
            .collect();
        if selected.is_empty() {
            return Err(RegistryError::NoMatch(ids.join(",")));
        }
        selected
    } else if options.auto_select {
        if candidates.len() != 1 {
            return Err(RegistryError::Ambiguous(candidates.len()));
        }
        candidates
    } else {
        candidates
    };

    let skipped_files = (!scan.parse_failures.is_empty() || !scan.read_failures.is_empty())
        .then(|| SkippedFiles {
            parse_failures: scan.parse_failures.clone(),
            read_failures: scan.read_failures.clone(),
        });

    Ok(ListEnvelope {
        request_id: options
            .request_id
            .clone()
            .unwrap_or_else(|| AUTO_REQUEST_ID.to_string()),
        summary: ListSummary {
            total_instances: scan.total_files,
            returned_instances: instances.len(),
            stale_instances,
            ttl_ms: options.ttl_ms,
            parse_failures: scan.parse_failures.len(),
            read_failures: scan.read_failures.len(),
        },
        instances,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        skipped_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_is_trimmed_and_deduplicated() {
        let options = ListOptions {
            selector: Some(" id-a, ,id-b,id-a ".into()),
            ..Default::default()
        };
        assert_eq!(options.selector_ids(), Some(vec!["id-a".into(), "id-b".into()]));

        let blank = ListOptions {
            selector: Some(" , ".into()),
            ..Default::default()
        };
        assert_eq!(blank.selector_ids(), None);
    }
}
