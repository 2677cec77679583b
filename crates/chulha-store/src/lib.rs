// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Live collection store for the admin console: subscriptions over the
//! backing document store, sequential id allocation, asset uploads,
//! authentication and the basic details document.

mod allocator;
pub mod auth;
mod backend;
mod config;
mod details;
mod error;
mod live;
mod local_fs;
mod memory;
mod upload;
mod write_queue;

pub use allocator::{AllocationStrategy, SequentialIdAllocator};
pub use backend::{
    sort_documents, BackendError, BackendErrorCode, DocumentStore, Snapshot, SnapshotFeed,
    SnapshotSender,
};
pub use config::{
    env_bool, env_duration_ms, env_u64, StoreConfig, UploadConfig, DEFAULT_UPLOAD_BASE_URL,
    DEFAULT_UPLOAD_TIMEOUT_MS, ENV_CHULHA_ID_STRATEGY, ENV_CHULHA_UPLOAD_BASE_URL,
    ENV_CHULHA_UPLOAD_CLOUD_NAME, ENV_CHULHA_UPLOAD_PRESET, ENV_CHULHA_UPLOAD_TIMEOUT_MS,
};
pub use details::BasicDetailsRepository;
pub use error::{OperationStage, StoreError, StoreErrorCode};
pub use live::{LiveCollectionStore, SubscriptionHandle, SubscriptionState};
pub use local_fs::LocalFsDocumentStore;
pub use memory::{InMemoryDocumentStore, WriteLogEntry, WriteOp, COUNTERS_COLLECTION};
pub use upload::{
    guess_mime_type, parse_upload_response, AssetSource, HttpUploadGateway, LocalAsset,
    UploadGateway, DEFAULT_MIME_TYPE,
};
pub use write_queue::WriteQueue;

pub const CRATE_NAME: &str = "chulha-store";
