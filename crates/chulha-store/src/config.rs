// SPDX-License-Identifier: Apache-2.0

use crate::allocator::AllocationStrategy;
use crate::error::{OperationStage, StoreError, StoreErrorCode};
use chulha_core::{resolve_chulha_data_dir_with, ENV_CHULHA_LOG_JSON};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_CHULHA_UPLOAD_BASE_URL: &str = "CHULHA_UPLOAD_BASE_URL";
pub const ENV_CHULHA_UPLOAD_CLOUD_NAME: &str = "CHULHA_UPLOAD_CLOUD_NAME";
pub const ENV_CHULHA_UPLOAD_PRESET: &str = "CHULHA_UPLOAD_PRESET";
pub const ENV_CHULHA_UPLOAD_TIMEOUT_MS: &str = "CHULHA_UPLOAD_TIMEOUT_MS";
pub const ENV_CHULHA_ID_STRATEGY: &str = "CHULHA_ID_STRATEGY";

pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://api.cloudinary.com";
pub const DEFAULT_UPLOAD_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub base_url: String,
    pub cloud_name: String,
    pub upload_preset: String,
    pub timeout: Duration,
}

impl UploadConfig {
    #[must_use]
    pub fn new(base_url: &str, cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cloud_name: cloud_name.to_string(),
            upload_preset: upload_preset.to_string(),
            timeout: Duration::from_millis(DEFAULT_UPLOAD_TIMEOUT_MS),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_root: PathBuf,
    /// `None` unless both the cloud name and the preset are configured.
    pub upload: Option<UploadConfig>,
    pub id_strategy: AllocationStrategy,
    pub log_json: bool,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_root = resolve_chulha_data_dir_with(&lookup);
        let cloud_name = non_empty(&lookup, ENV_CHULHA_UPLOAD_CLOUD_NAME);
        let preset = non_empty(&lookup, ENV_CHULHA_UPLOAD_PRESET);
        let upload = match (cloud_name, preset) {
            (Some(cloud_name), Some(preset)) => {
                let base_url = non_empty(&lookup, ENV_CHULHA_UPLOAD_BASE_URL)
                    .unwrap_or_else(|| DEFAULT_UPLOAD_BASE_URL.to_string());
                Some(
                    UploadConfig::new(&base_url, &cloud_name, &preset).with_timeout(
                        env_duration_ms(
                            &lookup,
                            ENV_CHULHA_UPLOAD_TIMEOUT_MS,
                            DEFAULT_UPLOAD_TIMEOUT_MS,
                        ),
                    ),
                )
            }
            _ => None,
        };
        let id_strategy = match non_empty(&lookup, ENV_CHULHA_ID_STRATEGY) {
            Some(raw) => AllocationStrategy::parse(&raw).map_err(|e| {
                StoreError::new(StoreErrorCode::Config, OperationStage::Validate, e)
            })?,
            None => AllocationStrategy::default(),
        };
        Ok(Self {
            data_root,
            upload,
            id_strategy,
            log_json: env_bool(&lookup, ENV_CHULHA_LOG_JSON, false),
        })
    }

    #[must_use]
    pub fn with_data_root(mut self, data_root: impl Into<PathBuf>) -> Self {
        self.data_root = data_root.into();
        self
    }
}

fn non_empty<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_bool<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str, default: bool) -> bool {
    lookup(name)
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

pub fn env_u64<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str, default: u64) -> u64 {
    lookup(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

pub fn env_duration_ms<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    name: &str,
    default_ms: u64,
) -> Duration {
    Duration::from_millis(env_u64(lookup, name, default_ms))
}
