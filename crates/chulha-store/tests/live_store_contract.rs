// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chulha_model::collections::{
    self, ReservationStatus, STAFF_DESCRIPTION, STAFF_DESIGNATION, STAFF_ID, STAFF_NAME,
};
use chulha_model::{
    CollectionRef, DocumentId, FieldValue, Record, SortKey, WireDocument,
};
use chulha_store::{
    BackendError, DocumentStore, InMemoryDocumentStore, LiveCollectionStore, LocalAsset,
    OperationStage, SnapshotFeed, SnapshotSender, StoreError, StoreErrorCode, SubscriptionState,
    UploadGateway, WriteOp,
};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};

fn staff_fields(name: &str) -> BTreeMap<String, FieldValue> {
    BTreeMap::from([
        (STAFF_NAME.to_string(), FieldValue::from(name)),
        (STAFF_DESIGNATION.to_string(), FieldValue::from("Chef")),
        (STAFF_DESCRIPTION.to_string(), FieldValue::from("Tandoor specialist")),
    ])
}

fn photo() -> LocalAsset {
    LocalAsset::from_bytes(vec![0xff, 0xd8, 0xff], "photo.jpg", "image/jpeg")
}

struct FakeGateway {
    calls: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl FakeGateway {
    fn ok(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl UploadGateway for FakeGateway {
    fn gateway_tag(&self) -> &'static str {
        "fake"
    }

    async fn upload(&self, asset: &LocalAsset) -> Result<String, StoreError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(StoreError::new(
                StoreErrorCode::UploadRejected,
                OperationStage::Upload,
                "Upload preset not found",
            ));
        }
        Ok(format!("https://cdn.example/{n}/{}", asset.file_name))
    }
}

fn recorder() -> (
    impl Fn(&[Record]) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Vec<Record>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (move |records: &[Record]| {
        let _ = tx.send(records.to_vec());
    }, rx)
}

async fn next_update(rx: &mut mpsc::UnboundedReceiver<Vec<Record>>) -> Vec<Record> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("update in time")
        .expect("update channel open")
}

async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Vec<Record>>) {
    assert!(
        tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .is_err(),
        "unexpected extra update"
    );
}

fn staff_ids(records: &[Record]) -> Vec<u64> {
    records
        .iter()
        .filter_map(|r| r.sequential_id.map(|s| s.get()))
        .collect()
}

#[tokio::test]
async fn sequential_inserts_allocate_one_to_n() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");

    let mut ids = Vec::new();
    for i in 0..5 {
        let record = store
            .insert(&staff, staff_fields(&format!("cook {i}")), None)
            .await
            .expect("insert");
        assert!(record.id.is_some());
        ids.push(record.sequential_id.expect("sequential id").get());
    }
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(backend.documents(staff.reference()).await.len(), 5);
}

#[tokio::test]
async fn concurrent_inserts_from_two_instances_may_share_an_id() {
    let backend: Arc<InMemoryDocumentStore> =
        Arc::new(InMemoryDocumentStore::new().with_write_delay(Duration::from_millis(50)));
    let first = LiveCollectionStore::new(backend.clone());
    let second = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");

    let (a, b) = tokio::join!(
        first.insert(&staff, staff_fields("Asha"), None),
        second.insert(&staff, staff_fields("Bilal"), None),
    );
    let a = a.expect("first insert");
    let b = b.expect("second insert");
    // Read-max allocation is not isolated: both saw an empty collection.
    assert_eq!(a.sequential_id, b.sequential_id);
    assert_eq!(a.sequential_id.map(|s| s.get()), Some(1));
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn back_to_back_inserts_write_in_submission_order() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let gateway = Arc::new(FakeGateway::ok(Duration::from_millis(100)));
    let store = LiveCollectionStore::new(backend.clone()).with_upload_gateway(gateway.clone());
    let staff = collections::staff().expect("staff");

    let (slow, fast) = tokio::join!(
        store.insert(&staff, staff_fields("slow"), Some(photo())),
        store.insert(&staff, staff_fields("fast"), None),
    );
    let slow = slow.expect("slow insert");
    let fast = fast.expect("fast insert");
    assert_eq!(slow.sequential_id.map(|s| s.get()), Some(1));
    assert_eq!(fast.sequential_id.map(|s| s.get()), Some(2));
    assert_eq!(slow.image_ref.as_deref(), Some("https://cdn.example/1/photo.jpg"));

    let log = backend.write_log().await;
    let order: Vec<_> = log.iter().map(|e| e.id.clone()).collect();
    assert_eq!(order, vec![slow.id.expect("slow id"), fast.id.expect("fast id")]);
    assert!(log.iter().all(|e| e.op == WriteOp::Add));
}

#[tokio::test]
async fn failed_upload_never_reaches_allocator_or_write() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let gateway = Arc::new(FakeGateway::failing());
    let store = LiveCollectionStore::new(backend.clone()).with_upload_gateway(gateway.clone());
    let staff = collections::staff().expect("staff");

    let err = store
        .insert(&staff, staff_fields("Asha"), Some(photo()))
        .await
        .expect_err("upload fails");
    assert_eq!(err.code, StoreErrorCode::UploadRejected);
    assert!(err.is_upload_failure());
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.query_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.write_calls.load(Ordering::SeqCst), 0);
    assert!(backend.write_log().await.is_empty());
}

#[tokio::test]
async fn insert_with_asset_but_no_gateway_is_a_config_error() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");
    let err = store
        .insert(&staff, staff_fields("Asha"), Some(photo()))
        .await
        .expect_err("no gateway");
    assert_eq!(err.code, StoreErrorCode::Config);
    assert_eq!(err.stage, OperationStage::Upload);
    assert_eq!(backend.write_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn allocation_failure_stops_before_write() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    backend.fail_queries.store(true, Ordering::SeqCst);
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");
    let err = store
        .insert(&staff, staff_fields("Asha"), None)
        .await
        .expect_err("allocation fails");
    assert_eq!(err.code, StoreErrorCode::StoreUnavailable);
    assert!(err.is_allocation_failure());
    assert_eq!(backend.write_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn write_failure_surfaces_at_write_stage() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    backend.fail_writes.store(true, Ordering::SeqCst);
    let gateway = Arc::new(FakeGateway::ok(Duration::ZERO));
    let store = LiveCollectionStore::new(backend.clone()).with_upload_gateway(gateway);
    let staff = collections::staff().expect("staff");
    let err = store
        .insert(&staff, staff_fields("Asha"), Some(photo()))
        .await
        .expect_err("write fails");
    assert_eq!(err.code, StoreErrorCode::Write);
    assert_eq!(err.stage(), OperationStage::Write);
}

#[tokio::test]
async fn invalid_fields_are_rejected_before_any_io() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");

    let mut missing = staff_fields("Asha");
    missing.remove(STAFF_NAME);
    let err = store.insert(&staff, missing, None).await.expect_err("missing");
    assert_eq!(err.code, StoreErrorCode::Decode);
    assert_eq!(err.stage, OperationStage::Validate);

    let mut reserved = staff_fields("Asha");
    reserved.insert(STAFF_ID.to_string(), FieldValue::from(99_i64));
    let err = store.insert(&staff, reserved, None).await.expect_err("reserved");
    assert_eq!(err.code, StoreErrorCode::Decode);

    assert_eq!(backend.query_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.write_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn blank_required_text_is_rejected_before_any_io() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");

    for blank in ["", "   "] {
        let err = store
            .insert(&staff, staff_fields(blank), None)
            .await
            .expect_err("blank name");
        assert_eq!(err.code, StoreErrorCode::Decode);
        assert_eq!(err.stage, OperationStage::Validate);
        assert!(err.message.contains(STAFF_NAME), "{}", err.message);
    }
    assert_eq!(backend.query_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.write_calls.load(Ordering::SeqCst), 0);

    let created = store
        .insert(&staff, staff_fields("Asha"), None)
        .await
        .expect("insert");
    let err = store
        .update(
            &staff,
            created.id.as_ref().expect("id"),
            BTreeMap::from([(STAFF_DESIGNATION.to_string(), FieldValue::from(" "))]),
        )
        .await
        .expect_err("blank designation");
    assert_eq!(err.stage, OperationStage::Validate);
    assert_eq!(backend.write_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn undeclared_fields_are_written_through() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");
    let mut fields = staff_fields("Asha");
    fields.insert("nickname".to_string(), FieldValue::from("A"));
    let record = store.insert(&staff, fields, None).await.expect("insert");
    assert_eq!(record.extra.get("nickname"), Some(&Value::from("A")));

    let docs = backend.documents(staff.reference()).await;
    assert_eq!(docs[0].fields.get("nickname"), Some(&Value::from("A")));
    assert!(docs[0].fields.get("createdAt").is_some());
    assert_eq!(docs[0].fields.get("staffImage"), Some(&Value::Null));
}

#[tokio::test]
async fn remove_of_missing_document_is_not_found_without_mutation() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");
    store
        .insert(&staff, staff_fields("Asha"), None)
        .await
        .expect("insert");
    let before = backend.documents(staff.reference()).await;

    let missing = DocumentId::parse("does-not-exist").expect("id");
    let err = store.remove(&staff, &missing).await.expect_err("missing");
    assert_eq!(err.code, StoreErrorCode::NotFound);
    assert_eq!(err.stage, OperationStage::Delete);
    assert_eq!(backend.documents(staff.reference()).await, before);
    assert_eq!(backend.write_log().await.len(), 1);
}

#[tokio::test]
async fn remove_failure_other_than_missing_is_write_error() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");
    let record = store
        .insert(&staff, staff_fields("Asha"), None)
        .await
        .expect("insert");
    backend.fail_writes.store(true, Ordering::SeqCst);
    let err = store
        .remove(&staff, record.id.as_ref().expect("id"))
        .await
        .expect_err("write fails");
    assert_eq!(err.code, StoreErrorCode::Write);
}

#[tokio::test]
async fn open_delivers_sorted_snapshot_then_one_update_per_mutation() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let other_client = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");
    for name in ["a", "b", "c"] {
        store
            .insert(&staff, staff_fields(name), None)
            .await
            .expect("seed");
    }

    let (on_update, mut rx) = recorder();
    let handle = store
        .open(&staff, &SortKey::descending(STAFF_ID), on_update)
        .await
        .expect("open");
    let initial = next_update(&mut rx).await;
    assert_eq!(staff_ids(&initial), vec![3, 2, 1]);
    assert_eq!(handle.state().await, SubscriptionState::Live);
    assert_quiet(&mut rx).await;

    let added = other_client
        .insert(&staff, staff_fields("d"), None)
        .await
        .expect("insert from other client");
    let after_insert = next_update(&mut rx).await;
    assert_eq!(staff_ids(&after_insert), vec![4, 3, 2, 1]);
    assert_quiet(&mut rx).await;

    other_client
        .remove(&staff, added.id.as_ref().expect("id"))
        .await
        .expect("remove");
    let after_remove = next_update(&mut rx).await;
    assert_eq!(staff_ids(&after_remove), vec![3, 2, 1]);
    assert_quiet(&mut rx).await;

    assert_eq!(store.cached(&handle).await.expect("cached").len(), 3);
    assert_eq!(handle.deliveries().await, 3);
    store.close(&handle).await;
}

#[tokio::test]
async fn insert_does_not_touch_the_cache_until_the_feed_delivers() {
    let (sender_slot, feed_backend) = ManualFeedStore::new();
    let backend = Arc::new(feed_backend);
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");
    let (on_update, mut rx) = recorder();
    let handle = store
        .open(&staff, staff.default_sort(), on_update)
        .await
        .expect("open");
    assert_eq!(handle.state().await, SubscriptionState::Subscribing);

    store
        .insert(&staff, staff_fields("Asha"), None)
        .await
        .expect("insert");
    assert!(handle.cached().await.is_empty());
    assert_quiet(&mut rx).await;

    let docs = backend.inner.documents(staff.reference()).await;
    let sender = sender_slot.lock().await.take().expect("feed sender");
    sender.send(Ok(docs)).expect("push snapshot");
    assert_eq!(next_update(&mut rx).await.len(), 1);
    assert_eq!(handle.cached().await.len(), 1);
}

#[tokio::test]
async fn close_before_first_snapshot_suppresses_on_update() {
    let (sender_slot, backend) = ManualFeedStore::new();
    let store = LiveCollectionStore::new(Arc::new(backend));
    let staff = collections::staff().expect("staff");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handle = store
        .open(&staff, staff.default_sort(), move |_: &[Record]| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .expect("open");
    store.close(&handle).await;
    assert_eq!(handle.state().await, SubscriptionState::Closed);

    if let Some(sender) = sender_slot.lock().await.take() {
        let _ = sender.send(Ok(Vec::new()));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    store.close(&handle).await;
    assert_eq!(handle.state().await, SubscriptionState::Closed);
    let err = store.cached(&handle).await.expect_err("closed");
    assert_eq!(err.code, StoreErrorCode::Closed);
}

#[tokio::test]
async fn no_delivery_after_close_returns() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");
    let (on_update, mut rx) = recorder();
    let handle = store
        .open(&staff, staff.default_sort(), on_update)
        .await
        .expect("open");
    next_update(&mut rx).await;
    store.close(&handle).await;

    store
        .insert(&staff, staff_fields("late"), None)
        .await
        .expect("insert after close");
    assert_quiet(&mut rx).await;
    assert_eq!(handle.deliveries().await, 1);
}

#[tokio::test]
async fn feed_failure_moves_handle_to_error_then_closed() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");
    let (on_update, mut rx) = recorder();
    let handle = store
        .open(&staff, staff.default_sort(), on_update)
        .await
        .expect("open");
    next_update(&mut rx).await;

    backend.break_feeds("connection reset").await;
    for _ in 0..50 {
        if handle.state().await == SubscriptionState::Error {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(handle.state().await, SubscriptionState::Error);
    let err = handle.last_error().await.expect("last error");
    assert_eq!(err.code, StoreErrorCode::StoreUnavailable);
    assert!(err.message.contains("connection reset"));

    store.close(&handle).await;
    assert_eq!(handle.state().await, SubscriptionState::Closed);
}

#[tokio::test]
async fn subscribe_failure_is_reported_by_open() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    backend.fail_subscribe.store(true, Ordering::SeqCst);
    let store = LiveCollectionStore::new(backend);
    let staff = collections::staff().expect("staff");
    let err = store
        .open(&staff, staff.default_sort(), |_: &[Record]| {})
        .await
        .err()
        .expect("subscribe fails");
    assert_eq!(err.code, StoreErrorCode::StoreUnavailable);
    assert_eq!(err.stage, OperationStage::Subscribe);
}

#[tokio::test]
async fn undecodable_documents_are_skipped_in_snapshots() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let staff = collections::staff().expect("staff");
    store
        .insert(&staff, staff_fields("Asha"), None)
        .await
        .expect("insert");
    let mut broken = Map::new();
    broken.insert(STAFF_NAME.to_string(), Value::from(42));
    backend
        .add_document(staff.reference(), broken)
        .await
        .expect("raw add");

    let records = store
        .fetch_once(&staff, staff.default_sort())
        .await
        .expect("fetch");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text(STAFF_NAME), Some("Asha"));
}

#[tokio::test]
async fn update_merges_fields_and_keeps_identity() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let reservations = collections::reservations().expect("reservations");
    let fields = BTreeMap::from([
        ("name".to_string(), FieldValue::from("Kaur family")),
        ("date".to_string(), FieldValue::from("2026-10-20")),
        ("time".to_string(), FieldValue::from("19:30")),
        ("guests".to_string(), FieldValue::from(6_i64)),
        ("status".to_string(), FieldValue::from("pending")),
    ]);
    let created = store
        .insert(&reservations, fields, None)
        .await
        .expect("insert");
    let id = created.id.clone().expect("id");

    let updated = store
        .update(
            &reservations,
            &id,
            BTreeMap::from([("time".to_string(), FieldValue::from("20:00"))]),
        )
        .await
        .expect("update");
    assert_eq!(updated.text("time"), Some("20:00"));
    assert_eq!(updated.text("status"), Some("pending"));
    assert_eq!(updated.text("name"), Some("Kaur family"));
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.id, Some(id.clone()));

    let missing = DocumentId::parse("nope").expect("id");
    let err = store
        .update(&reservations, &missing, BTreeMap::new())
        .await
        .expect_err("missing");
    assert_eq!(err.code, StoreErrorCode::NotFound);

    let err = store
        .update(
            &reservations,
            &id,
            BTreeMap::from([("guests".to_string(), FieldValue::from("many"))]),
        )
        .await
        .expect_err("wrong kind");
    assert_eq!(err.code, StoreErrorCode::Decode);
}

fn booking(status: &str) -> BTreeMap<String, FieldValue> {
    BTreeMap::from([
        ("name".to_string(), FieldValue::from("Rohan Sharma")),
        ("date".to_string(), FieldValue::from("2026-11-20")),
        ("time".to_string(), FieldValue::from("19:30")),
        ("guests".to_string(), FieldValue::from(4_i64)),
        ("status".to_string(), FieldValue::from(status)),
    ])
}

#[tokio::test]
async fn pending_booking_can_be_confirmed_or_cancelled_once() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let reservations = collections::reservations().expect("reservations");

    let approved = store
        .insert(&reservations, booking("Pending"), None)
        .await
        .expect("insert");
    let approved_id = approved.id.clone().expect("id");
    let confirmed = store
        .set_reservation_status(&reservations, &approved_id, ReservationStatus::Confirmed)
        .await
        .expect("confirm");
    assert_eq!(confirmed.text("status"), Some("Confirmed"));
    assert_eq!(confirmed.text("name"), Some("Rohan Sharma"));

    let rejected = store
        .insert(&reservations, booking("pending"), None)
        .await
        .expect("insert");
    let rejected_id = rejected.id.clone().expect("id");
    let cancelled = store
        .set_reservation_status(&reservations, &rejected_id, ReservationStatus::Cancelled)
        .await
        .expect("cancel");
    assert_eq!(cancelled.text("status"), Some("Cancelled"));

    let writes = backend.write_calls.load(Ordering::SeqCst);
    for (id, target) in [
        (&approved_id, ReservationStatus::Cancelled),
        (&rejected_id, ReservationStatus::Confirmed),
        (&approved_id, ReservationStatus::Pending),
    ] {
        let err = store
            .set_reservation_status(&reservations, id, target)
            .await
            .expect_err("settled booking");
        assert_eq!(err.code, StoreErrorCode::Decode);
        assert_eq!(err.stage, OperationStage::Validate);
    }
    assert_eq!(backend.write_calls.load(Ordering::SeqCst), writes);
}

#[tokio::test]
async fn booking_status_is_not_free_text() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let store = LiveCollectionStore::new(backend.clone());
    let reservations = collections::reservations().expect("reservations");

    let err = store
        .insert(&reservations, booking("seated"), None)
        .await
        .expect_err("unknown status");
    assert_eq!(err.stage, OperationStage::Validate);

    let created = store
        .insert(&reservations, booking("Pending"), None)
        .await
        .expect("insert");
    let err = store
        .update(
            &reservations,
            created.id.as_ref().expect("id"),
            BTreeMap::from([("status".to_string(), FieldValue::from("Confirmed"))]),
        )
        .await
        .expect_err("status through update");
    assert_eq!(err.stage, OperationStage::Validate);
    let docs = backend.documents(reservations.reference()).await;
    assert_eq!(docs[0].fields.get("status"), Some(&Value::from("Pending")));

    let staff = collections::staff().expect("staff");
    let member = store
        .insert(&staff, staff_fields("Asha"), None)
        .await
        .expect("insert");
    let err = store
        .set_reservation_status(&staff, member.id.as_ref().expect("id"), ReservationStatus::Confirmed)
        .await
        .expect_err("staff has no status");
    assert_eq!(err.code, StoreErrorCode::Decode);
}

/// Backend whose feed is pushed by hand from the test.
struct ManualFeedStore {
    inner: InMemoryDocumentStore,
    sender: Arc<Mutex<Option<SnapshotSender>>>,
}

impl ManualFeedStore {
    fn new() -> (Arc<Mutex<Option<SnapshotSender>>>, Self) {
        let sender = Arc::new(Mutex::new(None));
        (
            Arc::clone(&sender),
            Self {
                inner: InMemoryDocumentStore::new(),
                sender,
            },
        )
    }
}

#[async_trait]
impl DocumentStore for ManualFeedStore {
    fn backend_tag(&self) -> &'static str {
        "manual-feed"
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
        self.inner.set_document(collection, id, fields).await
    }

    async fn add_document(
        &self,
        collection: &CollectionRef,
        fields: Map<String, Value>,
    ) -> Result<DocumentId, BackendError> {
        self.inner.add_document(collection, fields).await
    }

    async fn delete_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
    ) -> Result<(), BackendError> {
        self.inner.delete_document(collection, id).await
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
        _collection: &CollectionRef,
        _sort: &SortKey,
    ) -> Result<SnapshotFeed, BackendError> {
        let (sender, feed) = SnapshotFeed::channel();
        *self.sender.lock().await = Some(sender);
        Ok(feed)
    }
}
