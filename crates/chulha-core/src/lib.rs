// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub const CRATE_NAME: &str = "chulha-core";

pub const ENV_CHULHA_LOG_LEVEL: &str = "CHULHA_LOG_LEVEL";
pub const ENV_CHULHA_LOG_JSON: &str = "CHULHA_LOG_JSON";
pub const ENV_CHULHA_DATA_ROOT: &str = "CHULHA_DATA_ROOT";

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExitCode {
    Success = 0,
    Usage = 2,
    Validation = 3,
    DependencyFailure = 4,
    Internal = 10,
}

impl ExitCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Usage => "usage",
            Self::Validation => "validation",
            Self::DependencyFailure => "dependency_failure",
            Self::Internal => "internal",
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Resolves the directory holding locally persisted collections.
///
/// Lookup order: `CHULHA_DATA_ROOT`, `$XDG_DATA_HOME/chulha`,
/// `$HOME/.local/share/chulha`, then `.chulha/data` relative to the working
/// directory.
#[must_use]
pub fn resolve_chulha_data_dir() -> PathBuf {
    resolve_chulha_data_dir_with(|name| std::env::var(name).ok())
}

#[must_use]
pub fn resolve_chulha_data_dir_with<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(explicit) = non_empty(ENV_CHULHA_DATA_ROOT) {
        return PathBuf::from(explicit);
    }
    if let Some(xdg_data_home) = non_empty("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data_home).join("chulha");
    }
    if let Some(home) = non_empty("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("chulha");
    }
    PathBuf::from(".chulha").join("data")
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl MachineError {
    #[must_use]
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, key: &str, value: &str) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for MachineError {}
