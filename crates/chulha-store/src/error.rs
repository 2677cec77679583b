// SPDX-License-Identifier: Apache-2.0

use chulha_model::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StoreErrorCode {
    Decode,
    StoreUnavailable,
    UploadRejected,
    Network,
    Write,
    NotFound,
    Closed,
    Config,
}

impl StoreErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode_error",
            Self::StoreUnavailable => "store_unavailable",
            Self::UploadRejected => "upload_rejected",
            Self::Network => "network_error",
            Self::Write => "write_error",
            Self::NotFound => "not_found",
            Self::Closed => "subscription_closed",
            Self::Config => "config_error",
        }
    }
}

/// Step of a store operation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OperationStage {
    Validate,
    Upload,
    Allocate,
    Write,
    Delete,
    Query,
    Subscribe,
}

impl OperationStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Upload => "upload",
            Self::Allocate => "allocate",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Query => "query",
            Self::Subscribe => "subscribe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} during {}: {message}", code.as_str(), stage.as_str())]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub stage: OperationStage,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(code: StoreErrorCode, stage: OperationStage, message: impl Into<String>) -> Self {
        Self {
            code,
            stage,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decode(stage: OperationStage, err: &DecodeError) -> Self {
        Self::new(StoreErrorCode::Decode, stage, err.to_string())
    }

    #[must_use]
    pub fn code(&self) -> StoreErrorCode {
        self.code
    }

    #[must_use]
    pub fn stage(&self) -> OperationStage {
        self.stage
    }

    #[must_use]
    pub fn is_upload_failure(&self) -> bool {
        self.stage == OperationStage::Upload
    }

    #[must_use]
    pub fn is_allocation_failure(&self) -> bool {
        self.stage == OperationStage::Allocate
    }
}
