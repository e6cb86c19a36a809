// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use async_trait::async_trait;
use brokk_ctl_config::ConfigPaths;
use brokk_ctl_keys::KeyManager;
use brokk_ctl_server::{
    ControlServer, ControlServerError, ExecError, ExecStartRequest, ExecStarted, ExecutionManager,
    ProvisioningExecManager, SandboxStatus, ServerConfig, CTL_KEY_HEADER,
};
use brokk_instances::InstanceRecord;
use brokk_sandbox_policy::{Platform, SandboxPolicy};
use brokk_worktree::WorktreeProvisioner;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

const GRACE: Duration = Duration::from_secs(2);

struct Harness {
    _tmp: TempDir,
    server: ControlServer,
    base_url: String,
    key: String,
    client: reqwest::Client,
}

impl Harness {
    async fn start(exec: Option<Arc<dyn ExecutionManager>>) -> Self {
        let tmp = TempDir::new().unwrap();
        let keys = Arc::new(KeyManager::new(&ConfigPaths::for_base_config_dir(tmp.path())));
        let record = InstanceRecord::new(
            "instance-under-test",
            Some(std::process::id()),
            "127.0.0.1:0",
            vec![PathBuf::from("/projects/zeta"), PathBuf::from("/projects/alpha")],
            "9.9.9",
        );

        let mut server = ControlServer::new(ServerConfig::default(), record, Arc::clone(&keys));
        if let Some(exec) = exec {
            server = server.with_exec_manager(exec);
        }
        let addr = server.start().await.unwrap();
        let key = keys.load_or_create_key().unwrap().as_str().to_string();

        Self {
            _tmp: tmp,
            server,
            base_url: format!("http://{addr}"),
            key,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(self.url(path))
            .header(CTL_KEY_HEADER, &self.key)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .header(CTL_KEY_HEADER, &self.key)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn stop(self) {
        self.server.stop(GRACE).await;
    }
}

/// Records calls and answers with a fixed workspace
#[derive(Default)]
struct RecordingExec {
    stopped: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl ExecutionManager for RecordingExec {
    async fn start(&self, request: ExecStartRequest) -> Result<ExecStarted, ExecError> {
        if request.repo_path.as_os_str() == "/bad" {
            return Err(ExecError::InvalidRequest("unknown repository".into()));
        }
        let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);
        Ok(ExecStarted {
            session_id,
            workspace_path: PathBuf::from("/worktrees").join(session_id.to_string()),
            sandbox: SandboxStatus {
                platform: Platform::Linux,
                enforced: true,
            },
        })
    }

    async fn stop(&self, session_id: Uuid) -> Result<(), ExecError> {
        self.stopped.lock().unwrap().push(session_id);
        Ok(())
    }

    fn healthcheck(&self) -> bool {
        true
    }
}

struct PanickingExec;

#[async_trait]
impl ExecutionManager for PanickingExec {
    async fn start(&self, _request: ExecStartRequest) -> Result<ExecStarted, ExecError> {
        panic!("boom");
    }

    async fn stop(&self, _session_id: Uuid) -> Result<(), ExecError> {
        Ok(())
    }

    fn healthcheck(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn missing_key_is_unauthorized() {
    let h = Harness::start(None).await;

    let response = h.client.get(h.url("/v1/ctl-info")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "unauthorized" }));

    h.stop().await;
}

#[tokio::test]
async fn wrong_key_is_unauthorized() {
    let h = Harness::start(None).await;

    for wrong in ["wrong-key".to_string(), format!("{}x", h.key), h.key[..10].to_string()] {
        let response = h
            .client
            .get(h.url("/v1/ctl-info"))
            .header(CTL_KEY_HEADER, wrong)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "unauthorized");
    }

    // Unknown routes are behind the same gate
    let response = h.client.get(h.url("/v1/nope")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = h.get("/v1/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "not_found" }));

    h.stop().await;
}

#[tokio::test]
async fn ctl_info_reports_instance() {
    let h = Harness::start(None).await;

    let (status, body) = h.get("/v1/ctl-info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instanceId"], "instance-under-test");
    assert_eq!(body["pid"], std::process::id());
    assert_eq!(body["listenAddr"], h.base_url.trim_start_matches("http://"));
    assert_eq!(body["projects"], json!(["/projects/zeta", "/projects/alpha"]));
    assert_eq!(body["appVersion"], "9.9.9");
    assert!(body["brokkctlVersion"].is_string());

    let capabilities: Vec<&str> = body["supportedCapabilities"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(capabilities.contains(&"exec.start"));
    assert!(capabilities.contains(&"ctl.info"));

    h.stop().await;
}

#[tokio::test]
async fn header_name_is_case_insensitive() {
    let h = Harness::start(None).await;

    let response = h
        .client
        .get(h.url("/v1/ctl-info"))
        .header("brokk-ctl-key", &h.key)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    h.stop().await;
}

#[tokio::test]
async fn lifecycle_rules() {
    let tmp = TempDir::new().unwrap();
    let keys = Arc::new(KeyManager::new(&ConfigPaths::for_base_config_dir(tmp.path())));
    let server = ControlServer::new(
        ServerConfig::default(),
        InstanceRecord::for_current_process(vec![], "test"),
        keys,
    );

    assert_eq!(server.port(), None);
    let addr = server.start().await.unwrap();
    assert_eq!(server.port(), Some(addr.port()));
    assert_ne!(addr.port(), 0);
    assert!(addr.ip().is_loopback());

    assert!(matches!(
        server.start().await,
        Err(ControlServerError::AlreadyStarted)
    ));

    server.stop(GRACE).await;
    server.stop(GRACE).await;
    assert!(matches!(server.start().await, Err(ControlServerError::Stopped)));

    // The port no longer accepts connections
    let refused = reqwest::Client::new()
        .get(format!("http://{addr}/v1/ctl-info"))
        .timeout(Duration::from_secs(2))
        .send()
        .await;
    assert!(refused.is_err());
}

#[tokio::test]
async fn non_loopback_bind_is_refused() {
    let tmp = TempDir::new().unwrap();
    let paths = ConfigPaths::for_base_config_dir(tmp.path());
    let keys = Arc::new(KeyManager::new(&paths));

    for addr in ["0.0.0.0:0", "[::]:0"] {
        let config = ServerConfig {
            bind_addr: addr.parse().unwrap(),
            ..ServerConfig::default()
        };
        let server = ControlServer::new(
            config,
            InstanceRecord::for_current_process(vec![], "test"),
            Arc::clone(&keys),
        );
        assert!(
            matches!(server.start().await, Err(ControlServerError::NonLoopback(_))),
            "{addr}"
        );
        assert_eq!(server.port(), None);
    }
    // Refused before touching the key
    assert!(!paths.key_path().exists());

    let ipv6_loopback = ServerConfig {
        bind_addr: "[::1]:0".parse().unwrap(),
        ..ServerConfig::default()
    };
    let server = ControlServer::new(
        ipv6_loopback,
        InstanceRecord::for_current_process(vec![], "test"),
        keys,
    );
    // ::1 may be unavailable in some sandboxes; it must never be NonLoopback
    assert!(!matches!(server.start().await, Err(ControlServerError::NonLoopback(_))));
    server.stop(GRACE).await;
}

#[tokio::test]
async fn stop_before_start_is_safe() {
    let tmp = TempDir::new().unwrap();
    let keys = Arc::new(KeyManager::new(&ConfigPaths::for_base_config_dir(tmp.path())));
    let server = ControlServer::new(
        ServerConfig::default(),
        InstanceRecord::for_current_process(vec![], "test"),
        keys,
    );

    server.stop(GRACE).await;
    assert_eq!(server.local_addr(), None);
}

#[tokio::test]
async fn start_creates_control_key() {
    let tmp = TempDir::new().unwrap();
    let paths = ConfigPaths::for_base_config_dir(tmp.path().join("fresh"));
    let keys = Arc::new(KeyManager::new(&paths));
    let server = ControlServer::new(
        ServerConfig::default(),
        InstanceRecord::for_current_process(vec![], "test"),
        keys,
    );

    server.start().await.unwrap();
    let on_disk = std::fs::read_to_string(paths.key_path()).unwrap();
    assert_eq!(on_disk.len(), 64);

    server.stop(GRACE).await;
}

#[tokio::test]
async fn exec_routes_without_manager_are_not_implemented() {
    let h = Harness::start(None).await;

    let (status, body) = h.post("/v1/exec/start", json!({ "repoPath": "/repo" })).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body, json!({ "error": "not_implemented" }));

    let (status, _) = h.post(&format!("/v1/exec/{}/stop", Uuid::new_v4()), json!({})).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    // Readiness does not depend on a missing execution manager
    let (status, body) = h.get("/v1/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ready" }));

    h.stop().await;
}

#[tokio::test]
async fn exec_start_and_stop_delegate_to_manager() {
    let exec = Arc::new(RecordingExec::default());
    let h = Harness::start(Some(exec.clone())).await;
    let session = Uuid::new_v4();

    let (status, body) = h
        .post(
            "/v1/exec/start",
            json!({ "sessionId": session, "repoPath": "/repo", "ref": "main" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionId"], session.to_string());
    assert_eq!(body["workspacePath"], format!("/worktrees/{session}"));
    assert_eq!(body["sandbox"], json!({ "platform": "linux", "enforced": true }));

    let (status, body) = h.post(&format!("/v1/exec/{session}/stop"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "sessionId": session.to_string(), "status": "stopped" }));
    assert_eq!(*exec.stopped.lock().unwrap(), vec![session]);

    h.stop().await;
}

#[tokio::test]
async fn exec_bad_input_is_bad_request() {
    let h = Harness::start(Some(Arc::new(RecordingExec::default()))).await;

    let (status, body) = h.post("/v1/exec/start", json!({ "ref": "main" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert!(body["message"].is_string());

    let (status, body) = h.post("/v1/exec/start", json!({ "repoPath": "/bad" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "unknown repository");

    let (status, body) = h.post("/v1/exec/not-a-uuid/stop", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    h.stop().await;
}

#[tokio::test]
async fn panicking_handler_yields_internal_error_and_server_survives() {
    let h = Harness::start(Some(Arc::new(PanickingExec))).await;

    let (status, body) = h.post("/v1/exec/start", json!({ "repoPath": "/repo" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "internal", "message": "internal server error" }));

    let (status, _) = h.get("/v1/ctl-info").await;
    assert_eq!(status, StatusCode::OK);

    h.stop().await;
}

#[tokio::test]
async fn readiness_reports_unhealthy_provisioner() {
    let h = Harness::start(Some(Arc::new(PanickingExec))).await;

    let (status, body) = h.get("/v1/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "provisioner_unhealthy");
    assert!(body["message"].is_string());

    h.stop().await;
}

fn check_git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn setup_git_repo() -> TempDir {
    let repo = TempDir::new().unwrap();
    let run = |args: &[&str]| {
        let status = Command::new("git")
            .args(["-c", "user.email=test@example.com", "-c", "user.name=Test User"])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(repo.path())
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    };
    run(&["init", "-b", "main"]);
    std::fs::write(repo.path().join("test.txt"), "Hello, World!").unwrap();
    run(&["add", "test.txt"]);
    run(&["commit", "-m", "Initial commit"]);
    repo
}

#[tokio::test]
async fn exec_provisions_real_worktree() {
    if !check_git_available() {
        eprintln!("Skipping test: git not available");
        return;
    }
    let repo = setup_git_repo();
    let worktrees = TempDir::new().unwrap();
    let provisioner = Arc::new(WorktreeProvisioner::new(worktrees.path()).unwrap());
    let exec = ProvisioningExecManager::new(provisioner, SandboxPolicy::default())
        .unwrap()
        .with_platform(Platform::Windows);
    let h = Harness::start(Some(Arc::new(exec))).await;

    let (status, body) = h.get("/v1/health/ready").await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = h
        .post(
            "/v1/exec/start",
            json!({ "repoPath": repo.path() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sandbox"], json!({ "platform": "windows", "enforced": false }));

    let workspace = PathBuf::from(body["workspacePath"].as_str().unwrap());
    assert!(workspace.starts_with(worktrees.path()));
    assert_eq!(
        std::fs::read_to_string(workspace.join("test.txt")).unwrap(),
        "Hello, World!"
    );

    let session = body["sessionId"].as_str().unwrap().to_string();
    let (status, _) = h.post(&format!("/v1/exec/{session}/stop"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!workspace.exists());

    h.stop().await;
}
