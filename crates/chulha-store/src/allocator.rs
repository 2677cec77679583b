// SPDX-License-Identifier: Apache-2.0

use crate::backend::{BackendError, DocumentStore};
use crate::error::{OperationStage, StoreError, StoreErrorCode};
use chulha_model::{json_kind_name, CollectionRef, SequentialId};
use std::sync::Arc;
use tracing::{debug, instrument};

/// How sequential ids are drawn from the backing store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// Read the current maximum and add one. Not isolated: two allocations
    /// racing before either write lands can return the same id.
    #[default]
    ReadMax,
    /// Atomic increment of a counter document held by the backing store.
    AtomicCounter,
}

impl AllocationStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadMax => "read-max",
            Self::AtomicCounter => "atomic-counter",
        }
    }

    pub fn parse(input: &str) -> Result<Self, String> {
        match input.trim().to_ascii_lowercase().as_str() {
            "read-max" | "read_max" | "readmax" => Ok(Self::ReadMax),
            "atomic-counter" | "atomic_counter" | "counter" => Ok(Self::AtomicCounter),
            other => Err(format!(
                "unknown id strategy `{other}` (expected read-max or atomic-counter)"
            )),
        }
    }
}

pub struct SequentialIdAllocator {
    backend: Arc<dyn DocumentStore>,
    strategy: AllocationStrategy,
}

impl SequentialIdAllocator {
    #[must_use]
    pub fn new(backend: Arc<dyn DocumentStore>, strategy: AllocationStrategy) -> Self {
        Self { backend, strategy }
    }

    #[must_use]
    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    #[instrument(name = "allocate_sequential_id", skip(self), fields(strategy = self.strategy.as_str()))]
    pub async fn next_id(
        &self,
        collection: &CollectionRef,
        field: &str,
    ) -> Result<SequentialId, StoreError> {
        let id = match self.strategy {
            AllocationStrategy::ReadMax => self.read_max(collection, field).await?,
            AllocationStrategy::AtomicCounter => {
                let value = self
                    .backend
                    .increment_counter(collection, field)
                    .await
                    .map_err(unavailable)?;
                SequentialId::new(value).map_err(|e| {
                    StoreError::new(StoreErrorCode::Decode, OperationStage::Allocate, e.0)
                })?
            }
        };
        debug!(collection = %collection, id = id.get(), "sequential id allocated");
        Ok(id)
    }

    async fn read_max(
        &self,
        collection: &CollectionRef,
        field: &str,
    ) -> Result<SequentialId, StoreError> {
        let Some(doc) = self
            .backend
            .query_max(collection, field)
            .await
            .map_err(unavailable)?
        else {
            return Ok(SequentialId::FIRST);
        };
        let raw = doc.fields.get(field).ok_or_else(|| {
            StoreError::new(
                StoreErrorCode::Decode,
                OperationStage::Allocate,
                format!("maximum document of {collection} has no `{field}`"),
            )
        })?;
        let current = SequentialId::from_wire(raw).ok_or_else(|| {
            StoreError::new(
                StoreErrorCode::Decode,
                OperationStage::Allocate,
                format!(
                    "maximum `{field}` of {collection} is {} `{raw}`, not a positive integer",
                    json_kind_name(raw)
                ),
            )
        })?;
        current.successor().ok_or_else(|| {
            StoreError::new(
                StoreErrorCode::StoreUnavailable,
                OperationStage::Allocate,
                format!("`{field}` of {collection} has no successor after {current}"),
            )
        })
    }
}

fn unavailable(err: BackendError) -> StoreError {
    StoreError::new(
        StoreErrorCode::StoreUnavailable,
        OperationStage::Allocate,
        err.to_string(),
    )
}
