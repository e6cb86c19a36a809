// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The shared control secret.
//!
//! Every instance under one base config directory trusts the same secret,
//! stored as the only content of `ctl.key`. The first caller generates it;
//! concurrent creators race on an exclusive no-clobber link so exactly one
//! value wins and the others read it back. A blank file is repaired under an
//! exclusive lock file so repairers also converge on one value.

pub mod error;

pub use error::{KeyError, Result};

use brokk_ctl_config::ConfigPaths;
use rand::RngCore;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use subtle::ConstantTimeEq;
use tempfile::NamedTempFile;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// HTTP header carrying the control secret
pub const CTL_KEY_HEADER: &str = "Brokk-CTL-Key";

const SECRET_BYTES: usize = 32;

/// Control secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct CtlKey(String);

impl CtlKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a presented credential
    pub fn verify(&self, presented: &[u8]) -> bool {
        self.0.as_bytes().ct_eq(presented).into()
    }

    fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }
}

impl fmt::Debug for CtlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CtlKey([REDACTED])")
    }
}

/// Loads, creates and caches the secret stored at [`ConfigPaths::key_path`]
#[derive(Debug)]
pub struct KeyManager {
    key_path: PathBuf,
    cached: RwLock<Option<CtlKey>>,
}

impl KeyManager {
    pub fn new(paths: &ConfigPaths) -> Self {
        Self::with_key_path(paths.key_path())
    }

    pub fn with_key_path(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            cached: RwLock::new(None),
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Return the existing secret or create and persist a new one.
    ///
    /// After the first success the value is served from memory.
    pub fn load_or_create_key(&self) -> Result<CtlKey> {
        if let Ok(guard) = self.cached.read() {
            if let Some(key) = guard.as_ref() {
                return Ok(key.clone());
            }
        }

        let key = match read_stored(&self.key_path)? {
            Stored::Present(key) => key,
            Stored::Missing => self.create_key()?,
            Stored::Blank => self.replace_blank_key()?,
        };

        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(key.clone());
        }
        Ok(key)
    }

    /// Read the secret without creating it. Absent or blank files yield `None`.
    pub fn read_key(&self) -> Result<Option<CtlKey>> {
        read_key_file(&self.key_path)
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.key_path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.key_path.with_file_name(name)
    }

    fn key_dir(&self) -> PathBuf {
        match self.key_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn write_err(&self, source: std::io::Error) -> KeyError {
        KeyError::Write {
            path: self.key_path.clone(),
            source,
        }
    }

    /// Fresh secret in an owner-only temp file next to the key
    fn stage_candidate(&self) -> Result<(CtlKey, NamedTempFile)> {
        let dir = self.key_dir();
        std::fs::create_dir_all(&dir).map_err(|e| self.write_err(e))?;

        let candidate = CtlKey::generate();
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| self.write_err(e))?;
        #[cfg(unix)]
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| self.write_err(e))?;
        tmp.write_all(candidate.as_str().as_bytes())
            .map_err(|e| self.write_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_err(e))?;
        Ok((candidate, tmp))
    }

    /// Publish a new secret where none exists; losers read the winner's.
    fn create_key(&self) -> Result<CtlKey> {
        match self.publish_noclobber()? {
            Some(key) => Ok(key),
            None => match read_stored(&self.key_path)? {
                Stored::Present(key) => Ok(key),
                Stored::Blank => self.replace_blank_key(),
                Stored::Missing => Err(KeyError::Empty(self.key_path.clone())),
            },
        }
    }

    /// `None` when another writer got there first
    fn publish_noclobber(&self) -> Result<Option<CtlKey>> {
        let (candidate, tmp) = self.stage_candidate()?;
        match tmp.persist_noclobber(&self.key_path) {
            Ok(_) => {
                tracing::info!(path = %self.key_path.display(), "created control key");
                Ok(Some(candidate))
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(
                    path = %self.key_path.display(),
                    "control key created concurrently, using existing value"
                );
                Ok(None)
            }
            Err(e) => Err(self.write_err(e.error)),
        }
    }

    /// Replace a blank key file.
    ///
    /// Repairs are serialized by an exclusive lock file and the key is only
    /// replaced if it is still blank under the lock. A blank file is never
    /// missing, so creators on the no-clobber path cannot interleave.
    fn replace_blank_key(&self) -> Result<CtlKey> {
        let _lock = RepairLock::acquire(self.lock_path()).map_err(|e| self.write_err(e))?;

        match read_stored(&self.key_path)? {
            Stored::Present(key) => return Ok(key),
            Stored::Missing => {
                if let Some(key) = self.publish_noclobber()? {
                    return Ok(key);
                }
                return read_key_file(&self.key_path)?
                    .ok_or_else(|| KeyError::Empty(self.key_path.clone()));
            }
            Stored::Blank => {}
        }

        let (candidate, tmp) = self.stage_candidate()?;
        tracing::warn!(path = %self.key_path.display(), "replacing blank control key file");
        tmp.persist(&self.key_path).map_err(|e| self.write_err(e.error))?;
        Ok(candidate)
    }
}

/// Exclusive `ctl.key.lock`, removed on drop
struct RepairLock {
    path: PathBuf,
}

const LOCK_POLL: Duration = Duration::from_millis(5);
/// A lock older than this was left by a crashed process
const STALE_LOCK: Duration = Duration::from_secs(10);

impl RepairLock {
    fn acquire(path: PathBuf) -> std::io::Result<Self> {
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_age(&path).is_some_and(|age| age > STALE_LOCK) {
                        tracing::warn!(path = %path.display(), "removing stale key repair lock");
                        match std::fs::remove_file(&path) {
                            Ok(()) => {}
                            Err(e) if e.kind() == ErrorKind::NotFound => {}
                            Err(e) => return Err(e),
                        }
                        continue;
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn lock_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

impl Drop for RepairLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "failed to remove key repair lock");
        }
    }
}

enum Stored {
    Missing,
    Blank,
    Present(CtlKey),
}

fn read_key_file(path: &Path) -> Result<Option<CtlKey>> {
    Ok(match read_stored(path)? {
        Stored::Present(key) => Some(key),
        Stored::Missing | Stored::Blank => None,
    })
}

fn read_stored(path: &Path) -> Result<Stored> {
    match std::fs::read_to_string(path) {
        Ok(content) => match content.trim() {
            "" => Ok(Stored::Blank),
            trimmed => Ok(Stored::Present(CtlKey(trimmed.to_string()))),
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Stored::Missing),
        Err(source) => Err(KeyError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_is_hex() {
        let key = CtlKey::generate();
        assert_eq!(key.as_str().len(), SECRET_BYTES * 2);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(key, CtlKey::generate());
    }

    #[test]
    fn debug_redacts_secret() {
        let key = CtlKey("abc123".to_string());
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("abc123"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn verify_is_exact() {
        let key = CtlKey("abc123".to_string());
        assert!(key.verify(b"abc123"));
        assert!(!key.verify(b"abc124"));
        assert!(!key.verify(b"abc12"));
        assert!(!key.verify(b""));
    }
}
