// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Version of the control protocol spoken by this build
pub const BROKKCTL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current wall clock in epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Identity and reachability of one running instance.
///
/// Created once per process. The registry writer refreshes `updated_at` on
/// every heartbeat; the rest of the record does not change after the
/// control server is bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredRecord")]
pub struct InstanceRecord {
    pub instance_id: String,
    pub pid: Option<u32>,
    /// `host:port`; port 0 until the control server has started
    pub listen_addr: String,
    pub projects: Vec<PathBuf>,
    pub brokkctl_version: String,
    pub app_version: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// On-disk shape, accepting the older `startedAt`/`lastSeenMs` names. The
/// current names win when a file carries both.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct StoredRecord {
    instance_id: String,
    pid: Option<u32>,
    listen_addr: String,
    projects: Vec<PathBuf>,
    brokkctl_version: String,
    app_version: String,
    created_at: Option<i64>,
    started_at: Option<i64>,
    updated_at: Option<i64>,
    last_seen_ms: Option<i64>,
}

impl From<StoredRecord> for InstanceRecord {
    fn from(stored: StoredRecord) -> Self {
        Self {
            instance_id: stored.instance_id,
            pid: stored.pid,
            listen_addr: stored.listen_addr,
            projects: stored.projects,
            brokkctl_version: stored.brokkctl_version,
            app_version: stored.app_version,
            created_at: stored.created_at.or(stored.started_at).unwrap_or_default(),
            updated_at: stored.updated_at.or(stored.last_seen_ms).unwrap_or_default(),
        }
    }
}

impl InstanceRecord {
    pub fn new(
        instance_id: impl Into<String>,
        pid: Option<u32>,
        listen_addr: impl Into<String>,
        projects: Vec<PathBuf>,
        app_version: impl Into<String>,
    ) -> Self {
        let now = now_ms();
        Self {
            instance_id: instance_id.into(),
            pid,
            listen_addr: listen_addr.into(),
            projects,
            brokkctl_version: BROKKCTL_VERSION.to_string(),
            app_version: app_version.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record for this process with a fresh random id, not yet bound
    pub fn for_current_process(projects: Vec<PathBuf>, app_version: impl Into<String>) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            Some(std::process::id()),
            "127.0.0.1:0",
            projects,
            app_version,
        )
    }

    pub fn with_listen_addr(mut self, listen_addr: impl Into<String>) -> Self {
        self.listen_addr = listen_addr.into();
        self
    }

    /// Stale iff `now - updated_at > ttl`
    pub fn is_stale(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms.saturating_sub(self.updated_at) > ttl_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let record = InstanceRecord::new(
            "id-a",
            Some(42),
            "127.0.0.1:5000",
            vec![PathBuf::from("/proj/a"), PathBuf::from("/proj/b")],
            "1.2.3",
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["instanceId"], "id-a");
        assert_eq!(json["pid"], 42);
        assert_eq!(json["listenAddr"], "127.0.0.1:5000");
        assert_eq!(json["projects"], serde_json::json!(["/proj/a", "/proj/b"]));
        assert_eq!(json["brokkctlVersion"], BROKKCTL_VERSION);
        assert_eq!(json["appVersion"], "1.2.3");
        assert!(json["createdAt"].is_i64());
        assert!(json["updatedAt"].is_i64());
    }

    #[test]
    fn accepts_legacy_field_names() {
        let record: InstanceRecord = serde_json::from_str(
            r#"{"instanceId":"id-b","pid":null,"listenAddr":"addr-b","projects":[],
                "brokkctlVersion":"0.1.0","startedAt":100,"lastSeenMs":200}"#,
        )
        .unwrap();
        assert_eq!(record.created_at, 100);
        assert_eq!(record.updated_at, 200);
        assert_eq!(record.pid, None);
        assert_eq!(record.app_version, "");
    }

    #[test]
    fn current_names_win_over_legacy_ones() {
        let record: InstanceRecord = serde_json::from_str(
            r#"{"instanceId":"id-c","listenAddr":"addr-c","startedAt":1,"createdAt":5,
                "updatedAt":2,"lastSeenMs":3}"#,
        )
        .unwrap();
        assert_eq!(record.created_at, 5);
        assert_eq!(record.updated_at, 2);

        let record: InstanceRecord = serde_json::from_str(r#"{"instanceId":"id-d"}"#).unwrap();
        assert_eq!(record.created_at, 0);
        assert_eq!(record.updated_at, 0);
        assert!(record.projects.is_empty());
    }

    #[test]
    fn staleness_uses_strict_ttl() {
        let record = InstanceRecord {
            updated_at: 1_000,
            ..Default::default()
        };
        assert!(!record.is_stale(2_000, 1_000));
        assert!(record.is_stale(2_001, 1_000));
    }

    #[test]
    fn current_process_record_is_unbound() {
        let record = InstanceRecord::for_current_process(vec![], "dev");
        assert_eq!(record.pid, Some(std::process::id()));
        assert_eq!(record.listen_addr, "127.0.0.1:0");
        assert!(uuid::Uuid::parse_str(&record.instance_id).is_ok());
        assert_eq!(record.created_at, record.updated_at);
    }
}
