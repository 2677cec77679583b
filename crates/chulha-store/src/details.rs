// SPDX-License-Identifier: Apache-2.0

use crate::backend::DocumentStore;
use crate::error::{OperationStage, StoreError, StoreErrorCode};
use chulha_model::{
    BasicDetails, CollectionRef, DocumentId, ValidationError, BASIC_DETAILS_COLLECTION,
    BASIC_DETAILS_DOCUMENT,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// The single restaurant contact document.
pub struct BasicDetailsRepository {
    backend: Arc<dyn DocumentStore>,
    collection: CollectionRef,
    document: DocumentId,
}

impl BasicDetailsRepository {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Result<Self, StoreError> {
        let config = |e: ValidationError| {
            StoreError::new(StoreErrorCode::Config, OperationStage::Validate, e.0)
        };
        Ok(Self {
            backend,
            collection: CollectionRef::parse(BASIC_DETAILS_COLLECTION).map_err(config)?,
            document: DocumentId::parse(BASIC_DETAILS_DOCUMENT).map_err(config)?,
        })
    }

    #[instrument(name = "details_fetch", skip(self))]
    pub async fn fetch(&self) -> Result<Option<BasicDetails>, StoreError> {
        let doc = self
            .backend
            .get_document(&self.collection, &self.document)
            .await
            .map_err(|e| {
                StoreError::new(
                    StoreErrorCode::StoreUnavailable,
                    OperationStage::Query,
                    e.to_string(),
                )
            })?;
        doc.map(|doc| {
            BasicDetails::from_fields(doc.fields).map_err(|e| {
                StoreError::new(StoreErrorCode::Decode, OperationStage::Query, e.to_string())
            })
        })
        .transpose()
    }

    /// Writes the cleaned form of `details` and returns what was stored.
    #[instrument(name = "details_save", skip(self, details))]
    pub async fn save(&self, details: &BasicDetails) -> Result<BasicDetails, StoreError> {
        let cleaned = details.cleaned();
        let fields = cleaned.to_fields().map_err(|e| {
            StoreError::new(StoreErrorCode::Decode, OperationStage::Validate, e.to_string())
        })?;
        self.backend
            .set_document(&self.collection, &self.document, fields)
            .await
            .map_err(|e| StoreError::new(StoreErrorCode::Write, OperationStage::Write, e.to_string()))?;
        info!("basic details saved");
        Ok(cleaned)
    }
}
