// SPDX-License-Identifier: Apache-2.0

use crate::backend::{BackendError, BackendErrorCode, DocumentStore, SnapshotFeed};
use crate::memory::{
    counter_location, next_counter_value, CollectionMap, InMemoryDocumentStore,
};
use async_trait::async_trait;
use chulha_model::{CollectionRef, DocumentId, SortKey, WireDocument};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Document store persisted as one `<collection>.json` file per collection
/// under a root directory. Each file is a JSON object of id to fields.
///
/// State lives in an [`InMemoryDocumentStore`]. Every mutation first rewrites
/// the touched collection file through a temp file and rename, and only then
/// becomes visible to readers and feeds.
pub struct LocalFsDocumentStore {
    root: PathBuf,
    inner: InMemoryDocumentStore,
    persist_lock: Mutex<()>,
}

impl LocalFsDocumentStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error(&root, &e))?;
        let inner = InMemoryDocumentStore::new();
        let mut entries = tokio::fs::read_dir(&root)
            .await
            .map_err(|e| io_error(&root, &e))?;
        let mut loaded = 0usize;
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&root, &e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(collection) = CollectionRef::parse(stem) else {
                debug!(path = %path.display(), "skipping file with invalid collection name");
                continue;
            };
            let docs = read_collection_file(&path).await?;
            inner.load_collection(collection, docs).await;
            loaded += 1;
        }
        info!(root = %root.display(), collections = loaded, "local document store opened");
        Ok(Self {
            root,
            inner,
            persist_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn collection_path(&self, collection: &CollectionRef) -> PathBuf {
        self.root.join(format!("{collection}.json"))
    }

    /// Re-reads collection files changed by other processes and pushes a
    /// fresh snapshot to subscribers of each changed collection.
    pub async fn reload(&self) -> Result<Vec<CollectionRef>, BackendError> {
        let _guard = self.persist_lock.lock().await;
        let mut changed = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| io_error(&self.root, &e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.root, &e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(collection) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| CollectionRef::parse(s).ok())
            else {
                continue;
            };
            let on_disk = read_collection_file(&path).await?;
            if on_disk != self.inner.collection_map(&collection).await {
                self.inner.load_collection(collection.clone(), on_disk).await;
                self.inner.notify(&collection).await;
                changed.push(collection);
            }
        }
        if !changed.is_empty() {
            debug!(collections = changed.len(), "reloaded collections from disk");
        }
        Ok(changed)
    }

    /// Writes `docs` as the new content of `collection`, then applies it in
    /// memory and notifies subscribers. Callers hold `persist_lock`. A failed
    /// write leaves both the file and the in-memory view untouched.
    async fn commit(
        &self,
        collection: &CollectionRef,
        docs: CollectionMap,
    ) -> Result<(), BackendError> {
        let body: Map<String, Value> = docs
            .iter()
            .map(|(id, fields)| (id.to_string(), Value::Object(fields.clone())))
            .collect();
        let bytes = serde_json::to_vec_pretty(&Value::Object(body))
            .map_err(|e| BackendError::new(BackendErrorCode::Internal, e.to_string()))?;
        let path = self.collection_path(collection);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| io_error(&tmp, &e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(&path, &e));
        }
        debug!(path = %path.display(), "collection persisted");
        self.inner.load_collection(collection.clone(), docs).await;
        self.inner.notify(collection).await;
        Ok(())
    }
}

async fn read_collection_file(path: &Path) -> Result<CollectionMap, BackendError> {
    let raw = tokio::fs::read(path).await.map_err(|e| io_error(path, &e))?;
    let parsed: Map<String, Value> = serde_json::from_slice(&raw).map_err(|e| {
        BackendError::new(
            BackendErrorCode::Internal,
            format!("{} is not a JSON object of documents: {e}", path.display()),
        )
    })?;
    let mut docs = CollectionMap::new();
    for (id, fields) in parsed {
        let id = DocumentId::parse(&id)
            .map_err(|e| BackendError::new(BackendErrorCode::Internal, e.to_string()))?;
        let Value::Object(fields) = fields else {
            return Err(BackendError::new(
                BackendErrorCode::Internal,
                format!("document {id} in {} is not an object", path.display()),
            ));
        };
        docs.insert(id, fields);
    }
    Ok(docs)
}

fn io_error(path: &Path, err: &std::io::Error) -> BackendError {
    BackendError::new(
        BackendErrorCode::Unavailable,
        format!("{}: {err}", path.display()),
    )
}

#[async_trait]
impl DocumentStore for LocalFsDocumentStore {
    fn backend_tag(&self) -> &'static str {
        "local-fs"
    }

    async fn get_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
    ) -> Result<Option<WireDocument>, BackendError> {
        self.inner.get_document(collection, id).await
    }

    async fn set_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
        fields: Map<String, Value>,
    ) -> Result<(), BackendError> {
        let _guard = self.persist_lock.lock().await;
        let mut docs = self.inner.collection_map(collection).await;
        docs.insert(id.clone(), fields);
        self.commit(collection, docs).await
    }

    async fn add_document(
        &self,
        collection: &CollectionRef,
        fields: Map<String, Value>,
    ) -> Result<DocumentId, BackendError> {
        let _guard = self.persist_lock.lock().await;
        let id = self.inner.generate_id(collection)?;
        let mut docs = self.inner.collection_map(collection).await;
        docs.insert(id.clone(), fields);
        self.commit(collection, docs).await?;
        debug!(collection = %collection, id = %id, "document added");
        Ok(id)
    }

    async fn delete_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
    ) -> Result<(), BackendError> {
        let _guard = self.persist_lock.lock().await;
        let mut docs = self.inner.collection_map(collection).await;
        if docs.remove(id).is_none() {
            return Err(BackendError::new(
                BackendErrorCode::NotFound,
                format!("no document {collection}/{id}"),
            ));
        }
        self.commit(collection, docs).await
    }

    async fn query_max(
        &self,
        collection: &CollectionRef,
        field: &str,
    ) -> Result<Option<WireDocument>, BackendError> {
        self.inner.query_max(collection, field).await
    }

    async fn subscribe(
        &self,
        collection: &CollectionRef,
        sort: &SortKey,
    ) -> Result<SnapshotFeed, BackendError> {
        self.inner.subscribe(collection, sort).await
    }

    async fn increment_counter(
        &self,
        collection: &CollectionRef,
        field: &str,
    ) -> Result<u64, BackendError> {
        let _guard = self.persist_lock.lock().await;
        let (counters, counter_id) = counter_location(collection)?;
        let target = self.inner.collection_map(collection).await;
        let mut docs = self.inner.collection_map(&counters).await;
        let counter = docs.entry(counter_id).or_default();
        let next = next_counter_value(counter.get(field), Some(&target), collection, field)?;
        counter.insert(field.to_string(), Value::from(next));
        self.commit(&counters, docs).await?;
        Ok(next)
    }
}
