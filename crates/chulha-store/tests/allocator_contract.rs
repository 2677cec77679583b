// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chulha_model::{CollectionRef, SequentialId};
use chulha_store::{
    AllocationStrategy, DocumentStore, InMemoryDocumentStore, OperationStage,
    SequentialIdAllocator, StoreErrorCode,
};
use serde_json::{json, Map, Value};

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn menu() -> CollectionRef {
    CollectionRef::parse("menu").expect("collection")
}

#[tokio::test]
async fn empty_collection_starts_at_one() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let allocator = SequentialIdAllocator::new(backend, AllocationStrategy::ReadMax);
    let id = allocator.next_id(&menu(), "menuId").await.expect("id");
    assert_eq!(id, SequentialId::FIRST);
}

#[tokio::test]
async fn next_id_follows_the_maximum_including_string_ids() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    for raw in [json!(3), json!("11"), json!(7), Value::Null] {
        backend
            .add_document(&menu(), fields(json!({ "menuId": raw })))
            .await
            .expect("seed");
    }
    let allocator = SequentialIdAllocator::new(backend, AllocationStrategy::ReadMax);
    let id = allocator.next_id(&menu(), "menuId").await.expect("id");
    assert_eq!(id.get(), 12);
}

#[tokio::test]
async fn query_failure_is_store_unavailable_never_a_default() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    backend.fail_queries.store(true, Ordering::SeqCst);
    let allocator = SequentialIdAllocator::new(backend, AllocationStrategy::ReadMax);
    let err = allocator
        .next_id(&menu(), "menuId")
        .await
        .expect_err("query fails");
    assert_eq!(err.code, StoreErrorCode::StoreUnavailable);
    assert_eq!(err.stage, OperationStage::Allocate);
}

#[tokio::test]
async fn non_integer_maximum_is_a_decode_error() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    backend
        .add_document(&menu(), fields(json!({ "menuId": "twelve" })))
        .await
        .expect("seed");
    let allocator = SequentialIdAllocator::new(backend, AllocationStrategy::ReadMax);
    let err = allocator
        .next_id(&menu(), "menuId")
        .await
        .expect_err("bad max");
    assert_eq!(err.code, StoreErrorCode::Decode);
}

#[tokio::test]
async fn read_max_allocations_issued_together_can_collide() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let allocator = SequentialIdAllocator::new(backend, AllocationStrategy::ReadMax);
    let collection = menu();
    let (a, b) = tokio::join!(
        allocator.next_id(&collection, "menuId"),
        allocator.next_id(&collection, "menuId"),
    );
    assert_eq!(a.expect("a"), b.expect("b"));
}

#[tokio::test]
async fn atomic_counter_is_seeded_from_max_and_unique_under_concurrency() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    backend
        .add_document(&menu(), fields(json!({ "menuId": 5 })))
        .await
        .expect("seed");
    let allocator = Arc::new(SequentialIdAllocator::new(
        backend,
        AllocationStrategy::AtomicCounter,
    ));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let allocator = Arc::clone(&allocator);
        tasks.push(tokio::spawn(async move {
            allocator.next_id(&menu(), "menuId").await.expect("id").get()
        }));
    }
    let mut ids = BTreeSet::new();
    for task in tasks {
        ids.insert(task.await.expect("join"));
    }
    assert_eq!(ids, (6..=21).collect::<BTreeSet<u64>>());
}

#[tokio::test]
async fn atomic_counter_failure_is_store_unavailable() {
    let backend = Arc::new(InMemoryDocumentStore::new());
    backend.fail_writes.store(true, Ordering::SeqCst);
    let allocator = SequentialIdAllocator::new(backend, AllocationStrategy::AtomicCounter);
    let err = allocator
        .next_id(&menu(), "menuId")
        .await
        .expect_err("counter fails");
    assert_eq!(err.code, StoreErrorCode::StoreUnavailable);
}
