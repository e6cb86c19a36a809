// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use serde::{Deserialize, Serialize};

/// Host operating system family as far as sandboxing is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Macos,
    Linux,
    Windows,
    Unknown,
}

impl Platform {
    pub fn current() -> Self {
        Self::classify(std::env::consts::OS)
    }

    /// Classify an OS name such as `std::env::consts::OS` or a JVM style
    /// `os.name` value.
    pub fn classify(os_name: &str) -> Self {
        let name = os_name.to_ascii_lowercase();
        // "darwin" contains "win", so macOS must be checked first
        if name.contains("mac") || name.contains("darwin") {
            Platform::Macos
        } else if name.contains("linux") {
            Platform::Linux
        } else if name.contains("win") {
            Platform::Windows
        } else {
            Platform::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Macos => "macos",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether sandbox enforcement exists for the platform
pub fn is_supported_platform(platform: Platform) -> bool {
    matches!(platform, Platform::Macos | Platform::Linux)
}
