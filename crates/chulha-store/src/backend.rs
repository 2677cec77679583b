// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chulha_model::{compare_json_values, CollectionRef, DocumentId, SortDirection, SortKey, WireDocument};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum BackendErrorCode {
    NotFound,
    Unavailable,
    Rejected,
    Unsupported,
    Internal,
}

impl BackendErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unavailable => "unavailable",
            Self::Rejected => "rejected",
            Self::Unsupported => "unsupported",
            Self::Internal => "internal_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", code.as_str())]
pub struct BackendError {
    pub code: BackendErrorCode,
    pub message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(code: BackendErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Full, ordered contents of a collection at one point in time.
pub type Snapshot = Vec<WireDocument>;
pub type SnapshotSender = mpsc::UnboundedSender<Result<Snapshot, BackendError>>;

/// Push channel of collection snapshots. An `Err` item is terminal.
pub struct SnapshotFeed {
    receiver: mpsc::UnboundedReceiver<Result<Snapshot, BackendError>>,
}

impl SnapshotFeed {
    #[must_use]
    pub fn channel() -> (SnapshotSender, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }

    pub async fn next(&mut self) -> Option<Result<Snapshot, BackendError>> {
        self.receiver.recv().await
    }
}

/// Remote document database holding collections of flat JSON documents.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    async fn get_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
    ) -> Result<Option<WireDocument>, BackendError>;

    async fn set_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
        fields: Map<String, Value>,
    ) -> Result<(), BackendError>;

    async fn add_document(
        &self,
        collection: &CollectionRef,
        fields: Map<String, Value>,
    ) -> Result<DocumentId, BackendError>;

    /// Fails with `NotFound` when no such document exists.
    async fn delete_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
    ) -> Result<(), BackendError>;

    /// The document with the greatest non-null `field`, if any.
    async fn query_max(
        &self,
        collection: &CollectionRef,
        field: &str,
    ) -> Result<Option<WireDocument>, BackendError>;

    async fn subscribe(
        &self,
        collection: &CollectionRef,
        sort: &SortKey,
    ) -> Result<SnapshotFeed, BackendError>;

    /// Atomically bumps the counter kept for `collection`/`field` and returns
    /// the new value. The counter starts from the collection's current
    /// maximum of `field`.
    async fn increment_counter(
        &self,
        collection: &CollectionRef,
        field: &str,
    ) -> Result<u64, BackendError> {
        Err(BackendError::new(
            BackendErrorCode::Unsupported,
            format!(
                "{} backend has no atomic counters (collection {collection}, field {field})",
                self.backend_tag()
            ),
        ))
    }
}

/// Orders raw documents by `sort`, ties broken by document id.
pub fn sort_documents(documents: &mut [WireDocument], sort: &SortKey) {
    documents.sort_by(|a, b| {
        let ord = compare_json_values(a.fields.get(&sort.field), b.fields.get(&sort.field));
        let ord = match sort.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        ord.then_with(|| a.id.cmp(&b.id))
    });
}
