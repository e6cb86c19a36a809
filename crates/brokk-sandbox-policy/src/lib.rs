// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Sandbox policy model for agent executions.
//!
//! A [`SandboxPolicy`] describes which filesystem operations an executed
//! session may perform. This crate only models and validates the policy and
//! evaluates paths against it; applying it to a process is left to the
//! platform launcher, which should refuse to run when
//! [`is_supported_platform`] is false.

pub mod error;
pub mod pattern;
pub mod platform;

pub use error::{PolicyError, Result};
pub use platform::{Platform, is_supported_platform};

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Files that are never writable from inside a sandbox
pub const DANGEROUS_FILES: &[&str] = &[
    ".gitconfig",
    ".gitmodules",
    ".bashrc",
    ".bash_profile",
    ".zshrc",
    ".zprofile",
    ".profile",
    ".ripgreprc",
    ".mcp.json",
];

/// Directories that are never writable from inside a sandbox
pub const DANGEROUS_DIRECTORIES: &[&str] = &[".vscode", ".idea", ".claude/commands", ".claude/agents"];

/// Filesystem access rules.
///
/// Writes are denied unless a path matches `allow_write` and no `deny_write`
/// (or mandatory) pattern. Reads are allowed unless a path matches
/// `deny_read`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilesystemPolicy {
    #[serde(deserialize_with = "nullable_entries")]
    pub deny_read: Vec<String>,
    #[serde(deserialize_with = "nullable_entries")]
    pub allow_write: Vec<String>,
    #[serde(deserialize_with = "nullable_entries")]
    pub deny_write: Vec<String>,
    pub allow_git_config: bool,
}

/// Linux specific knobs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinuxOptions {
    pub allow_all_unix_sockets: bool,
}

/// Complete sandbox policy for one execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxPolicy {
    pub filesystem: FilesystemPolicy,
    pub linux: LinuxOptions,
}

/// Null list entries deserialize to empty strings so that validation can
/// report them together with blank entries instead of failing the parse.
fn nullable_entries<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Vec<Option<String>> = Vec::deserialize(deserializer)?;
    Ok(entries.into_iter().map(Option::unwrap_or_default).collect())
}

impl SandboxPolicy {
    pub fn new(filesystem: FilesystemPolicy) -> Self {
        Self {
            filesystem,
            linux: LinuxOptions::default(),
        }
    }

    /// Check structural well-formedness.
    ///
    /// Every violation is collected; the error lists all of them with their
    /// list name and index.
    pub fn validate(&self) -> Result<()> {
        let fs = &self.filesystem;
        let violations: Vec<String> = [
            ("denyRead", &fs.deny_read),
            ("allowWrite", &fs.allow_write),
            ("denyWrite", &fs.deny_write),
        ]
        .into_iter()
        .flat_map(|(name, entries)| {
            entries.iter().enumerate().filter(|(_, entry)| entry.trim().is_empty()).map(
                move |(index, _)| format!("filesystem.{name}[{index}] must not be null or blank"),
            )
        })
        .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::Invalid { violations })
        }
    }
}

impl FilesystemPolicy {
    /// Deny-write patterns applied regardless of configuration, relative to
    /// the execution's working directory.
    pub fn mandatory_deny_write(&self, cwd: &Path) -> Vec<String> {
        let mut deny = Vec::new();
        let mut push = |entry: String| {
            if !deny.contains(&entry) {
                deny.push(entry);
            }
        };

        for file in DANGEROUS_FILES {
            push(cwd.join(file).to_string_lossy().into_owned());
            push(format!("**/{file}"));
        }
        for dir in DANGEROUS_DIRECTORIES {
            push(cwd.join(dir).to_string_lossy().into_owned());
            push(format!("**/{dir}/**"));
        }

        push(cwd.join(".git/hooks").to_string_lossy().into_owned());
        push("**/.git/hooks/**".to_string());

        if !self.allow_git_config {
            push(cwd.join(".git/config").to_string_lossy().into_owned());
            push("**/.git/config".to_string());
        }

        deny
    }

    /// Configured deny-write patterns followed by the mandatory ones
    pub fn effective_deny_write(&self, cwd: &Path) -> Vec<String> {
        let mut all = self.deny_write.clone();
        all.extend(self.mandatory_deny_write(cwd));
        all
    }

    pub fn is_write_allowed(&self, path: &Path, cwd: &Path) -> bool {
        let denied = self
            .effective_deny_write(cwd)
            .iter()
            .any(|p| pattern::matches(p, path, cwd));
        if denied {
            return false;
        }
        self.allow_write.iter().any(|p| pattern::matches(p, path, cwd))
    }

    pub fn is_read_allowed(&self, path: &Path, cwd: &Path) -> bool {
        !self.deny_read.iter().any(|p| pattern::matches(p, path, cwd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn workspace() -> PathBuf {
        PathBuf::from("/work/session")
    }

    #[test]
    fn default_policy_is_least_privilege_and_valid() {
        let policy = SandboxPolicy::default();
        assert!(policy.validate().is_ok());
        assert!(!policy.linux.allow_all_unix_sockets);
        assert!(!policy.filesystem.allow_git_config);

        let cwd = workspace();
        assert!(!policy.filesystem.is_write_allowed(&cwd.join("src/main.rs"), &cwd));
        assert!(policy.filesystem.is_read_allowed(&cwd.join("src/main.rs"), &cwd));
    }

    #[test]
    fn validate_reports_every_blank_entry() {
        let policy = SandboxPolicy::new(FilesystemPolicy {
            deny_read: vec!["~/.ssh".into(), "  ".into()],
            allow_write: vec!["".into()],
            deny_write: vec!["ok".into(), "".into(), "\t".into()],
            allow_git_config: false,
        });

        let err = policy.validate().unwrap_err();
        let PolicyError::Invalid { violations } = &err;
        assert_eq!(
            violations,
            &vec![
                "filesystem.denyRead[1] must not be null or blank".to_string(),
                "filesystem.allowWrite[0] must not be null or blank".to_string(),
                "filesystem.denyWrite[1] must not be null or blank".to_string(),
                "filesystem.denyWrite[2] must not be null or blank".to_string(),
            ]
        );
        let message = err.to_string();
        assert!(message.contains("denyRead[1]"));
        assert!(message.contains("denyWrite[2]"));
    }

    #[test]
    fn null_entries_are_reported_not_rejected_by_parser() {
        let policy: SandboxPolicy = serde_json::from_str(
            r#"{"filesystem":{"denyRead":[null,"/etc/shadow"],"allowWrite":["."]}}"#,
        )
        .unwrap();
        let PolicyError::Invalid { violations } = policy.validate().unwrap_err();
        assert_eq!(violations, vec!["filesystem.denyRead[0] must not be null or blank"]);
    }

    #[test]
    fn null_filesystem_is_rejected_by_type() {
        let parsed = serde_json::from_str::<SandboxPolicy>(r#"{"filesystem":null}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn policy_loads_from_toml() {
        let policy: SandboxPolicy = toml::from_str(
            r#"
            [filesystem]
            allowWrite = ["."]
            denyWrite = ["secrets/**"]
            allowGitConfig = true

            [linux]
            allowAllUnixSockets = true
            "#,
        )
        .unwrap();
        assert_eq!(policy.filesystem.allow_write, vec!["."]);
        assert!(policy.filesystem.allow_git_config);
        assert!(policy.linux.allow_all_unix_sockets);
        assert!(policy.filesystem.deny_read.is_empty());
    }

    #[test]
    fn mandatory_denies_protect_git_config_unless_allowed() {
        let cwd = workspace();
        let mut fs = FilesystemPolicy {
            allow_write: vec![".".into()],
            ..Default::default()
        };

        let denies = fs.mandatory_deny_write(&cwd);
        assert!(denies.contains(&"/work/session/.git/config".to_string()));
        assert!(denies.contains(&"**/.git/hooks/**".to_string()));
        assert!(denies.contains(&"**/.bashrc".to_string()));
        assert!(!fs.is_write_allowed(&cwd.join(".git/config"), &cwd));
        assert!(!fs.is_write_allowed(&cwd.join(".git/hooks/pre-commit"), &cwd));

        fs.allow_git_config = true;
        assert!(!fs.mandatory_deny_write(&cwd).iter().any(|p| p.ends_with(".git/config")));
        assert!(fs.is_write_allowed(&cwd.join(".git/config"), &cwd));
    }

    #[test]
    fn deny_write_wins_over_allow_write() {
        let cwd = workspace();
        let fs = FilesystemPolicy {
            allow_write: vec![".".into()],
            deny_write: vec!["build/**".into()],
            ..Default::default()
        };

        assert!(fs.is_write_allowed(&cwd.join("src/lib.rs"), &cwd));
        assert!(!fs.is_write_allowed(&cwd.join("build/out/app"), &cwd));
        assert!(!fs.is_write_allowed(&cwd.join("nested/.vscode/settings.json"), &cwd));
        assert!(!fs.is_write_allowed(Path::new("/etc/passwd"), &cwd));
    }

    #[test]
    fn deny_read_is_independent_of_write_rules() {
        let cwd = workspace();
        let fs = FilesystemPolicy {
            deny_read: vec!["/etc/shadow".into(), "**/*.pem".into()],
            ..Default::default()
        };

        assert!(!fs.is_read_allowed(Path::new("/etc/shadow"), &cwd));
        assert!(!fs.is_read_allowed(&cwd.join("certs/server.pem"), &cwd));
        assert!(fs.is_read_allowed(&cwd.join("README.md"), &cwd));
    }
}
