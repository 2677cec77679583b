// SPDX-License-Identifier: Apache-2.0

use crate::backend::{
    sort_documents, BackendError, BackendErrorCode, DocumentStore, SnapshotFeed, SnapshotSender,
};
use async_trait::async_trait;
use chulha_core::sha256_hex;
use chulha_model::{
    compare_json_values, CollectionRef, DocumentId, SequentialId, SortKey, WireDocument,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::debug;

pub const COUNTERS_COLLECTION: &str = "_counters";

pub(crate) type CollectionMap = BTreeMap<DocumentId, Map<String, Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Add,
    Set,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteLogEntry {
    pub collection: CollectionRef,
    pub id: DocumentId,
    pub op: WriteOp,
    pub fields: Option<Map<String, Value>>,
}

struct Subscriber {
    collection: CollectionRef,
    sort: SortKey,
    sender: SnapshotSender,
}

/// Document store held entirely in process memory.
///
/// Every subscriber receives the full ordered snapshot of its collection on
/// subscribe and after each mutation of that collection. The public atomics
/// inject failures and count calls for tests.
pub struct InMemoryDocumentStore {
    collections: Mutex<BTreeMap<CollectionRef, CollectionMap>>,
    subscribers: Mutex<Vec<Subscriber>>,
    write_log: Mutex<Vec<WriteLogEntry>>,
    id_seed: u128,
    next_document: AtomicU64,
    write_delay: Duration,
    pub fail_queries: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_subscribe: AtomicBool,
    pub query_calls: AtomicU64,
    pub write_calls: AtomicU64,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self {
            collections: Mutex::new(BTreeMap::new()),
            subscribers: Mutex::new(Vec::new()),
            write_log: Mutex::new(Vec::new()),
            id_seed: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default(),
            next_document: AtomicU64::new(1),
            write_delay: Duration::ZERO,
            fail_queries: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            query_calls: AtomicU64::new(0),
            write_calls: AtomicU64::new(0),
        }
    }
}

impl InMemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every mutation by `delay` before it is applied.
    #[must_use]
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub async fn write_log(&self) -> Vec<WriteLogEntry> {
        self.write_log.lock().await.clone()
    }

    pub async fn documents(&self, collection: &CollectionRef) -> Vec<WireDocument> {
        self.collections
            .lock()
            .await
            .get(collection)
            .map(|docs| to_wire(docs))
            .unwrap_or_default()
    }

    /// Replaces the contents of `collection` without notifying subscribers.
    pub(crate) async fn load_collection(&self, collection: CollectionRef, docs: CollectionMap) {
        self.collections.lock().await.insert(collection, docs);
    }

    pub(crate) async fn collection_map(&self, collection: &CollectionRef) -> CollectionMap {
        self.collections
            .lock()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Ends every open feed with `message` as a terminal error.
    pub async fn break_feeds(&self, message: &str) {
        let mut subscribers = self.subscribers.lock().await;
        for sub in subscribers.drain(..) {
            let _ = sub.sender.send(Err(BackendError::new(
                BackendErrorCode::Unavailable,
                message.to_string(),
            )));
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|s| !s.sender.is_closed());
        subscribers.len()
    }

    pub(crate) fn generate_id(&self, collection: &CollectionRef) -> Result<DocumentId, BackendError> {
        let n = self.next_document.fetch_add(1, Ordering::Relaxed);
        let digest = sha256_hex(format!("{}:{collection}:{n}", self.id_seed).as_bytes());
        DocumentId::parse(&digest[..20])
            .map_err(|e| BackendError::new(BackendErrorCode::Internal, e.to_string()))
    }

    fn check_reads(&self) -> Result<(), BackendError> {
        self.query_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_queries.load(Ordering::Relaxed) {
            return Err(BackendError::new(
                BackendErrorCode::Unavailable,
                "injected query failure",
            ));
        }
        Ok(())
    }

    async fn check_writes(&self) -> Result<(), BackendError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(BackendError::new(
                BackendErrorCode::Unavailable,
                "injected write failure",
            ));
        }
        Ok(())
    }

    async fn record(&self, entry: WriteLogEntry) {
        self.write_log.lock().await.push(entry);
    }

    pub(crate) async fn notify(&self, collection: &CollectionRef) {
        let docs = self.collection_map(collection).await;
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|sub| {
            if &sub.collection != collection {
                return !sub.sender.is_closed();
            }
            let mut snapshot = to_wire(&docs);
            sort_documents(&mut snapshot, &sub.sort);
            sub.sender.send(Ok(snapshot)).is_ok()
        });
    }
}

fn to_wire(docs: &CollectionMap) -> Vec<WireDocument> {
    docs.iter()
        .map(|(id, fields)| WireDocument::new(Some(id.clone()), fields.clone()))
        .collect()
}

/// Counter document holding the allocation counters of `collection`.
pub(crate) fn counter_location(
    collection: &CollectionRef,
) -> Result<(CollectionRef, DocumentId), BackendError> {
    let counters = CollectionRef::parse(COUNTERS_COLLECTION)
        .map_err(|e| BackendError::new(BackendErrorCode::Internal, e.to_string()))?;
    let counter_id = DocumentId::parse(collection.as_str())
        .map_err(|e| BackendError::new(BackendErrorCode::Internal, e.to_string()))?;
    Ok((counters, counter_id))
}

/// Next counter value. A missing counter is seeded from the current maximum
/// of `field` in the target collection.
pub(crate) fn next_counter_value(
    current: Option<&Value>,
    target: Option<&CollectionMap>,
    collection: &CollectionRef,
    field: &str,
) -> Result<u64, BackendError> {
    let current = match current {
        Some(value) => value.as_u64().ok_or_else(|| {
            BackendError::new(
                BackendErrorCode::Internal,
                format!("counter {collection}.{field} is not an integer"),
            )
        })?,
        None => target
            .and_then(|docs| max_by_field(docs, field))
            .and_then(|doc| doc.fields.get(field).and_then(SequentialId::from_wire))
            .map_or(0, SequentialId::get),
    };
    current.checked_add(1).ok_or_else(|| {
        BackendError::new(
            BackendErrorCode::Internal,
            format!("counter {collection}.{field} overflowed"),
        )
    })
}

fn max_by_field(docs: &CollectionMap, field: &str) -> Option<WireDocument> {
    docs.iter()
        .filter(|(_, fields)| !matches!(fields.get(field), None | Some(Value::Null)))
        .max_by(|(_, a), (_, b)| compare_json_values(a.get(field), b.get(field)))
        .map(|(id, fields)| WireDocument::new(Some(id.clone()), fields.clone()))
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn get_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
    ) -> Result<Option<WireDocument>, BackendError> {
        self.check_reads()?;
        Ok(self
            .collections
            .lock()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| WireDocument::new(Some(id.clone()), fields.clone())))
    }

    async fn set_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
        fields: Map<String, Value>,
    ) -> Result<(), BackendError> {
        self.check_writes().await?;
        self.collections
            .lock()
            .await
            .entry(collection.clone())
            .or_default()
            .insert(id.clone(), fields.clone());
        self.record(WriteLogEntry {
            collection: collection.clone(),
            id: id.clone(),
            op: WriteOp::Set,
            fields: Some(fields),
        })
        .await;
        self.notify(collection).await;
        Ok(())
    }

    async fn add_document(
        &self,
        collection: &CollectionRef,
        fields: Map<String, Value>,
    ) -> Result<DocumentId, BackendError> {
        self.check_writes().await?;
        let id = self.generate_id(collection)?;
        self.collections
            .lock()
            .await
            .entry(collection.clone())
            .or_default()
            .insert(id.clone(), fields.clone());
        debug!(collection = %collection, id = %id, "document added");
        self.record(WriteLogEntry {
            collection: collection.clone(),
            id: id.clone(),
            op: WriteOp::Add,
            fields: Some(fields),
        })
        .await;
        self.notify(collection).await;
        Ok(id)
    }

    async fn delete_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
    ) -> Result<(), BackendError> {
        self.check_writes().await?;
        let removed = self
            .collections
            .lock()
            .await
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_none() {
            return Err(BackendError::new(
                BackendErrorCode::NotFound,
                format!("no document {collection}/{id}"),
            ));
        }
        self.record(WriteLogEntry {
            collection: collection.clone(),
            id: id.clone(),
            op: WriteOp::Delete,
            fields: None,
        })
        .await;
        self.notify(collection).await;
        Ok(())
    }

    async fn query_max(
        &self,
        collection: &CollectionRef,
        field: &str,
    ) -> Result<Option<WireDocument>, BackendError> {
        self.check_reads()?;
        Ok(self
            .collections
            .lock()
            .await
            .get(collection)
            .and_then(|docs| max_by_field(docs, field)))
    }

    async fn subscribe(
        &self,
        collection: &CollectionRef,
        sort: &SortKey,
    ) -> Result<SnapshotFeed, BackendError> {
        if self.fail_subscribe.load(Ordering::Relaxed) {
            return Err(BackendError::new(
                BackendErrorCode::Unavailable,
                "injected subscribe failure",
            ));
        }
        let (sender, feed) = SnapshotFeed::channel();
        let mut subscribers = self.subscribers.lock().await;
        let mut snapshot = self.documents(collection).await;
        sort_documents(&mut snapshot, sort);
        let _ = sender.send(Ok(snapshot));
        subscribers.push(Subscriber {
            collection: collection.clone(),
            sort: sort.clone(),
            sender,
        });
        Ok(feed)
    }

    async fn increment_counter(
        &self,
        collection: &CollectionRef,
        field: &str,
    ) -> Result<u64, BackendError> {
        self.check_writes().await?;
        let (counters, counter_id) = counter_location(collection)?;
        let next = {
            let mut all = self.collections.lock().await;
            let current = all
                .get(&counters)
                .and_then(|docs| docs.get(&counter_id))
                .and_then(|doc| doc.get(field));
            let next = next_counter_value(current, all.get(collection), collection, field)?;
            all.entry(counters.clone())
                .or_default()
                .entry(counter_id)
                .or_default()
                .insert(field.to_string(), Value::from(next));
            next
        };
        self.notify(&counters).await;
        Ok(next)
    }
}
