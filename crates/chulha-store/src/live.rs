// SPDX-License-Identifier: Apache-2.0

//! Live, sorted views over backing-store collections plus the write path
//! (upload, allocate, write) for new records.
//!
//! Each open subscription owns one consumer task. Snapshots are decoded and
//! handed to the caller's `on_update` under the handle's lock, the same lock
//! `close` takes, so deliveries never overlap and none happen after `close`
//! returns. Writes never touch a cache: the feed is the only way a write
//! becomes visible.

use crate::allocator::{AllocationStrategy, SequentialIdAllocator};
use crate::backend::{BackendErrorCode, DocumentStore, Snapshot, SnapshotFeed};
use crate::error::{OperationStage, StoreError, StoreErrorCode};
use crate::upload::{LocalAsset, UploadGateway};
use crate::write_queue::WriteQueue;
use chrono::Utc;
use chulha_model::collections::{self, ReservationStatus, RESERVATION_STATUS};
use chulha_model::{
    CollectionRef, CollectionSpec, DecodeError, DocumentId, FieldValue, Record, RecordCodec,
    SortKey,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    Idle,
    Subscribing,
    Live,
    Error,
    Closed,
}

impl SubscriptionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Subscribing => "subscribing",
            Self::Live => "live",
            Self::Error => "error",
            Self::Closed => "closed",
        }
    }
}

struct HandleShared {
    state: SubscriptionState,
    cache: Vec<Record>,
    last_error: Option<StoreError>,
    deliveries: u64,
    task: Option<JoinHandle<()>>,
}

/// Caller's reference to one open subscription. Clones share state.
#[derive(Clone)]
pub struct SubscriptionHandle {
    id: u64,
    collection: CollectionRef,
    shared: Arc<Mutex<HandleShared>>,
}

impl SubscriptionHandle {
    fn new(id: u64, collection: CollectionRef) -> Self {
        Self {
            id,
            collection,
            shared: Arc::new(Mutex::new(HandleShared {
                state: SubscriptionState::Idle,
                cache: Vec::new(),
                last_error: None,
                deliveries: 0,
                task: None,
            })),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    pub async fn state(&self) -> SubscriptionState {
        self.shared.lock().await.state
    }

    /// Records from the most recent delivered snapshot, in sort order.
    pub async fn cached(&self) -> Vec<Record> {
        self.shared.lock().await.cache.clone()
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.shared.lock().await.last_error.clone()
    }

    pub async fn deliveries(&self) -> u64 {
        self.shared.lock().await.deliveries
    }

    /// Stops delivery and detaches from the feed. Idempotent.
    pub async fn close(&self) {
        let mut shared = self.shared.lock().await;
        if shared.state == SubscriptionState::Closed {
            return;
        }
        let previous = shared.state;
        shared.state = SubscriptionState::Closed;
        if let Some(task) = shared.task.take() {
            task.abort();
        }
        debug!(handle = self.id, collection = %self.collection, from = previous.as_str(), "subscription closed");
    }
}

pub struct LiveCollectionStore {
    backend: Arc<dyn DocumentStore>,
    uploads: Option<Arc<dyn UploadGateway>>,
    allocator: SequentialIdAllocator,
    writes: WriteQueue,
    next_handle: AtomicU64,
}

impl LiveCollectionStore {
    #[must_use]
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self {
            allocator: SequentialIdAllocator::new(Arc::clone(&backend), AllocationStrategy::default()),
            backend,
            uploads: None,
            writes: WriteQueue::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn with_upload_gateway(mut self, gateway: Arc<dyn UploadGateway>) -> Self {
        self.uploads = Some(gateway);
        self
    }

    #[must_use]
    pub fn with_allocation_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.allocator = SequentialIdAllocator::new(Arc::clone(&self.backend), strategy);
        self
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn DocumentStore> {
        &self.backend
    }

    #[must_use]
    pub fn allocator(&self) -> &SequentialIdAllocator {
        &self.allocator
    }

    /// Starts a live view of `spec`'s collection ordered by `sort`.
    #[instrument(name = "live_open", skip(self, spec, on_update), fields(collection = %spec.reference()))]
    pub async fn open<F>(
        &self,
        spec: &CollectionSpec,
        sort: &SortKey,
        on_update: F,
    ) -> Result<SubscriptionHandle, StoreError>
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        let collection = spec.reference().clone();
        let handle = SubscriptionHandle::new(
            self.next_handle.fetch_add(1, Ordering::Relaxed),
            collection.clone(),
        );
        handle.shared.lock().await.state = SubscriptionState::Subscribing;

        let feed = match self.backend.subscribe(&collection, sort).await {
            Ok(feed) => feed,
            Err(e) => {
                let err = StoreError::new(
                    StoreErrorCode::StoreUnavailable,
                    OperationStage::Subscribe,
                    e.to_string(),
                );
                let mut shared = handle.shared.lock().await;
                shared.state = SubscriptionState::Error;
                shared.last_error = Some(err.clone());
                error!(collection = %collection, error = %err, "subscribe failed");
                return Err(err);
            }
        };

        let task = tokio::spawn(consume_feed(
            feed,
            spec.clone(),
            sort.clone(),
            Arc::clone(&handle.shared),
            on_update,
        ));
        let mut shared = handle.shared.lock().await;
        if shared.state == SubscriptionState::Closed {
            task.abort();
        } else {
            shared.task = Some(task);
        }
        drop(shared);
        info!(handle = handle.id, collection = %collection, "subscription opened");
        Ok(handle)
    }

    pub async fn close(&self, handle: &SubscriptionHandle) {
        handle.close().await;
    }

    /// Current cache of an open handle; `Closed` once the handle is closed.
    pub async fn cached(&self, handle: &SubscriptionHandle) -> Result<Vec<Record>, StoreError> {
        let shared = handle.shared.lock().await;
        if shared.state == SubscriptionState::Closed {
            return Err(StoreError::new(
                StoreErrorCode::Closed,
                OperationStage::Subscribe,
                format!("subscription {} on {} is closed", handle.id, handle.collection),
            ));
        }
        Ok(shared.cache.clone())
    }

    /// One sorted snapshot of the collection without keeping a subscription.
    #[instrument(name = "live_fetch_once", skip(self, spec), fields(collection = %spec.reference()))]
    pub async fn fetch_once(
        &self,
        spec: &CollectionSpec,
        sort: &SortKey,
    ) -> Result<Vec<Record>, StoreError> {
        let unavailable = |message: String| {
            StoreError::new(
                StoreErrorCode::StoreUnavailable,
                OperationStage::Query,
                message,
            )
        };
        let mut feed = self
            .backend
            .subscribe(spec.reference(), sort)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        match feed.next().await {
            Some(Ok(snapshot)) => Ok(decode_snapshot(spec, sort, snapshot)),
            Some(Err(e)) => Err(unavailable(e.to_string())),
            None => Err(unavailable("feed ended before the first snapshot".to_string())),
        }
    }

    /// Uploads `asset` (if any), allocates the sequential id and writes the
    /// record. The returned record carries the new document id; caches pick
    /// it up only through their feeds.
    #[instrument(name = "live_insert", skip(self, spec, fields, asset), fields(collection = %spec.reference()))]
    pub async fn insert(
        &self,
        spec: &CollectionSpec,
        fields: BTreeMap<String, FieldValue>,
        asset: Option<LocalAsset>,
    ) -> Result<Record, StoreError> {
        let collection = spec.reference();
        let layout = spec.layout();
        let codec = RecordCodec::new(layout);

        let mut record = Record::new(Utc::now());
        apply_fields(spec, &mut record, fields)?;
        validate(spec, &codec, &record)?;
        if asset.is_some() && layout.image_field().is_none() {
            return Err(StoreError::new(
                StoreErrorCode::Decode,
                OperationStage::Validate,
                format!("{collection} records carry no image"),
            ));
        }

        let _lane = self.writes.acquire(collection).await;

        if let Some(asset) = asset {
            let gateway = self.uploads.as_ref().ok_or_else(|| {
                StoreError::new(
                    StoreErrorCode::Config,
                    OperationStage::Upload,
                    "no upload gateway configured",
                )
            })?;
            let url = gateway.upload(&asset).await.inspect_err(|e| {
                warn!(
                    collection = %collection,
                    gateway = gateway.gateway_tag(),
                    error = %e,
                    "asset upload failed"
                );
            })?;
            record.image_ref = Some(url);
        }

        if let Some(field) = layout.sequential_field() {
            let id = self.allocator.next_id(collection, field).await.inspect_err(|e| {
                warn!(collection = %collection, error = %e, "id allocation failed");
            })?;
            record.sequential_id = Some(id);
        }

        let doc = codec.encode(&record);
        let id = self
            .backend
            .add_document(collection, doc.fields)
            .await
            .map_err(|e| {
                if let Some(url) = &record.image_ref {
                    warn!(collection = %collection, url = %url, "write failed after upload; asset is orphaned");
                }
                StoreError::new(StoreErrorCode::Write, OperationStage::Write, e.to_string())
            })?;
        record.id = Some(id);
        info!(
            collection = %collection,
            id = record.id.as_ref().map(DocumentId::as_str),
            sequential_id = record.sequential_id.map(|s| s.get()),
            "record inserted"
        );
        Ok(record)
    }

    #[instrument(name = "live_remove", skip(self, spec), fields(collection = %spec.reference()))]
    pub async fn remove(&self, spec: &CollectionSpec, id: &DocumentId) -> Result<(), StoreError> {
        let collection = spec.reference();
        let _lane = self.writes.acquire(collection).await;
        self.backend
            .delete_document(collection, id)
            .await
            .map_err(|e| {
                let code = if e.code == BackendErrorCode::NotFound {
                    StoreErrorCode::NotFound
                } else {
                    StoreErrorCode::Write
                };
                StoreError::new(code, OperationStage::Delete, e.message)
            })?;
        info!(collection = %collection, id = %id, "record removed");
        Ok(())
    }

    /// Merges `fields` into an existing record. The sequential id, creation
    /// time and image are kept as stored. A booking's status only changes
    /// through [`Self::set_reservation_status`].
    #[instrument(name = "live_update", skip(self, spec, fields), fields(collection = %spec.reference()))]
    pub async fn update(
        &self,
        spec: &CollectionSpec,
        id: &DocumentId,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<Record, StoreError> {
        if is_reservations(spec) && fields.contains_key(RESERVATION_STATUS) {
            return Err(StoreError::new(
                StoreErrorCode::Decode,
                OperationStage::Validate,
                "reservation status changes only by confirming or cancelling a pending booking",
            ));
        }
        let collection = spec.reference();
        let codec = RecordCodec::new(spec.layout());
        let _lane = self.writes.acquire(collection).await;

        let mut record = self.load_existing(spec, id).await?;
        apply_fields(spec, &mut record, fields)?;
        validate(spec, &codec, &record)?;
        self.store_existing(spec, id, &record).await?;
        info!(collection = %collection, id = %id, "record updated");
        Ok(record)
    }

    /// Moves a pending booking to `target`. Any other transition is refused
    /// without a write.
    #[instrument(name = "live_set_status", skip(self, spec, target), fields(collection = %spec.reference(), target = target.as_str()))]
    pub async fn set_reservation_status(
        &self,
        spec: &CollectionSpec,
        id: &DocumentId,
        target: ReservationStatus,
    ) -> Result<Record, StoreError> {
        if !is_reservations(spec) {
            return Err(StoreError::new(
                StoreErrorCode::Decode,
                OperationStage::Validate,
                format!("{} records carry no booking status", spec.reference()),
            ));
        }
        let collection = spec.reference();
        let _lane = self.writes.acquire(collection).await;

        let mut record = self.load_existing(spec, id).await?;
        let raw = record.text(RESERVATION_STATUS).unwrap_or_default().to_string();
        let current = ReservationStatus::parse(&raw)
            .map_err(|e| StoreError::decode(OperationStage::Validate, &e))?;
        if !current.can_become(target) {
            return Err(StoreError::new(
                StoreErrorCode::Decode,
                OperationStage::Validate,
                format!("booking {id} is {current}; only a pending booking can become {target}"),
            ));
        }
        record
            .fields
            .insert(RESERVATION_STATUS.to_string(), FieldValue::from(target.as_str()));
        self.store_existing(spec, id, &record).await?;
        info!(collection = %collection, id = %id, from = current.as_str(), to = target.as_str(), "booking status changed");
        Ok(record)
    }

    async fn load_existing(
        &self,
        spec: &CollectionSpec,
        id: &DocumentId,
    ) -> Result<Record, StoreError> {
        let collection = spec.reference();
        let doc = self
            .backend
            .get_document(collection, id)
            .await
            .map_err(|e| {
                StoreError::new(
                    StoreErrorCode::StoreUnavailable,
                    OperationStage::Query,
                    e.to_string(),
                )
            })?
            .ok_or_else(|| {
                StoreError::new(
                    StoreErrorCode::NotFound,
                    OperationStage::Query,
                    format!("no document {collection}/{id}"),
                )
            })?;
        RecordCodec::new(spec.layout())
            .decode(&doc)
            .map_err(|e| StoreError::decode(OperationStage::Query, &e))
    }

    async fn store_existing(
        &self,
        spec: &CollectionSpec,
        id: &DocumentId,
        record: &Record,
    ) -> Result<(), StoreError> {
        let encoded = RecordCodec::new(spec.layout()).encode(record);
        self.backend
            .set_document(spec.reference(), id, encoded.fields)
            .await
            .map_err(|e| StoreError::new(StoreErrorCode::Write, OperationStage::Write, e.to_string()))
    }
}

fn is_reservations(spec: &CollectionSpec) -> bool {
    spec.reference().as_str() == collections::RESERVATIONS_COLLECTION
}

fn apply_fields(
    spec: &CollectionSpec,
    record: &mut Record,
    fields: BTreeMap<String, FieldValue>,
) -> Result<(), StoreError> {
    let layout = spec.layout();
    for (name, value) in fields {
        if layout.is_reserved(&name) {
            return Err(StoreError::decode(
                OperationStage::Validate,
                &DecodeError::ReservedField { field: name },
            ));
        }
        if layout.field_spec(&name).is_some() {
            record.fields.insert(name, value);
        } else {
            record.extra.insert(name, value.to_json());
        }
    }
    Ok(())
}

/// Checks a record about to be written: it must decode under the layout,
/// carry no blank required text and, for bookings, a known status.
fn validate(
    spec: &CollectionSpec,
    codec: &RecordCodec<'_>,
    record: &Record,
) -> Result<(), StoreError> {
    let invalid = |e: DecodeError| StoreError::decode(OperationStage::Validate, &e);
    codec.decode(&codec.encode(record)).map_err(invalid)?;
    codec.check_filled(record).map_err(invalid)?;
    if is_reservations(spec) {
        let status = record.text(RESERVATION_STATUS).unwrap_or_default();
        ReservationStatus::parse(status).map_err(invalid)?;
    }
    Ok(())
}

fn decode_snapshot(spec: &CollectionSpec, sort: &SortKey, snapshot: Snapshot) -> Vec<Record> {
    let codec = RecordCodec::new(spec.layout());
    let records = snapshot
        .iter()
        .filter_map(|doc| match codec.decode(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    collection = %spec.reference(),
                    id = doc.id.as_ref().map(DocumentId::as_str),
                    error = %e,
                    "skipping undecodable document"
                );
                None
            }
        })
        .collect();
    codec.sorted(records, sort)
}

async fn consume_feed<F>(
    mut feed: SnapshotFeed,
    spec: CollectionSpec,
    sort: SortKey,
    shared: Arc<Mutex<HandleShared>>,
    on_update: F,
) where
    F: Fn(&[Record]) + Send + Sync + 'static,
{
    loop {
        let item = feed.next().await;
        let mut guard = shared.lock().await;
        if guard.state == SubscriptionState::Closed {
            return;
        }
        match item {
            Some(Ok(snapshot)) => {
                guard.cache = decode_snapshot(&spec, &sort, snapshot);
                guard.state = SubscriptionState::Live;
                guard.deliveries += 1;
                on_update(&guard.cache);
            }
            Some(Err(e)) => {
                error!(collection = %spec.reference(), error = %e, "subscription feed failed");
                guard.state = SubscriptionState::Error;
                guard.last_error = Some(StoreError::new(
                    StoreErrorCode::StoreUnavailable,
                    OperationStage::Subscribe,
                    e.to_string(),
                ));
                return;
            }
            None => {
                warn!(collection = %spec.reference(), "subscription feed ended");
                guard.state = SubscriptionState::Error;
                guard.last_error = Some(StoreError::new(
                    StoreErrorCode::StoreUnavailable,
                    OperationStage::Subscribe,
                    "feed ended",
                ));
                return;
            }
        }
    }
}
