// SPDX-License-Identifier: Apache-2.0

use crate::config::UploadConfig;
use crate::error::{OperationStage, StoreError, StoreErrorCode};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// An image picked on the client, not yet uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    pub source: AssetSource,
    pub mime_type: String,
    pub file_name: String,
}

impl LocalAsset {
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Self {
            mime_type: guess_mime_type(&path).to_string(),
            file_name,
            source: AssetSource::Path(path),
        }
    }

    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, file_name: &str, mime_type: &str) -> Self {
        Self {
            source: AssetSource::Bytes(bytes),
            mime_type: mime_type.to_string(),
            file_name: file_name.to_string(),
        }
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>, StoreError> {
        match &self.source {
            AssetSource::Bytes(bytes) => Ok(bytes.clone()),
            AssetSource::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                StoreError::new(
                    StoreErrorCode::Network,
                    OperationStage::Upload,
                    format!("cannot read asset {}: {e}", path.display()),
                )
            }),
        }
    }
}

#[must_use]
pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => DEFAULT_MIME_TYPE,
    }
}

/// Hosts an asset and returns its stable public URL.
#[async_trait]
pub trait UploadGateway: Send + Sync + 'static {
    fn gateway_tag(&self) -> &'static str;

    async fn upload(&self, asset: &LocalAsset) -> Result<String, StoreError>;
}

/// Unsigned multipart upload to an image hosting service.
pub struct HttpUploadGateway {
    config: UploadConfig,
    client: reqwest::Client,
}

impl HttpUploadGateway {
    #[must_use]
    pub fn new(config: UploadConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1_1/{}/image/upload",
            self.config.base_url.trim_end_matches('/'),
            self.config.cloud_name
        )
    }
}

fn rejected(message: impl Into<String>) -> StoreError {
    StoreError::new(
        StoreErrorCode::UploadRejected,
        OperationStage::Upload,
        message,
    )
}

fn network(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::Network, OperationStage::Upload, message)
}

/// Pulls the hosted URL out of an upload response body.
pub fn parse_upload_response(body: &[u8]) -> Result<String, StoreError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| rejected(format!("upload response is not JSON: {e}")))?;
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(rejected(message));
    }
    value
        .get("secure_url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| rejected("upload response has no secure_url"))
}

#[async_trait]
impl UploadGateway for HttpUploadGateway {
    fn gateway_tag(&self) -> &'static str {
        "http"
    }

    #[instrument(name = "upload_asset", skip(self, asset), fields(file = %asset.file_name))]
    async fn upload(&self, asset: &LocalAsset) -> Result<String, StoreError> {
        let bytes = asset.read_bytes().await?;
        let part = Part::bytes(bytes)
            .file_name(asset.file_name.clone())
            .mime_str(&asset.mime_type)
            .map_err(|e| rejected(format!("invalid mime type {}: {e}", asset.mime_type)))?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.config.upload_preset.clone())
            .text("cloud_name", self.config.cloud_name.clone());

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await
            .map_err(|e| network(format!("upload request failed: {e}")))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| network(format!("upload response unreadable: {e}")))?;

        if status.is_server_error() {
            warn!(status = status.as_u16(), "upload service error");
            return Err(network(format!("upload service returned {status}")));
        }
        if status.is_client_error() {
            let detail = parse_upload_response(&body)
                .err()
                .map_or_else(|| status.to_string(), |e| e.message);
            warn!(status = status.as_u16(), "upload rejected");
            return Err(rejected(format!("{status}: {detail}")));
        }
        let url = parse_upload_response(&body)?;
        info!(url = %url, "asset uploaded");
        Ok(url)
    }
}
