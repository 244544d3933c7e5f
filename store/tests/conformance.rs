//! Conformance suite for vector store implementations
//!
//! Every backend must pass these against the same inputs. The
//! in-memory store runs here unconditionally; the Postgres store is
//! exercised by pointing the same functions at a live database in the
//! deployment smoke tests.

use chrono::Utc;
use engram_store::{content_hash, MemoryVectorStore, VectorStore};
use engram_types::{HistoryEvent, HistoryEventKind, Memory, MemoryError, MemoryRecord};
use std::collections::HashMap;

const DIMS: usize = 8;

fn record(id: &str, owner: &str, content: &str, embedding: Vec<f32>) -> MemoryRecord {
    let now = Utc::now();
    MemoryRecord {
        memory: Memory {
            id: id.to_string(),
            owner_id: owner.to_string(),
            content: content.to_string(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            content_hash: content_hash(content),
        },
        embedding,
    }
}

fn unit_vec(hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIMS];
    v[hot] = 1.0;
    v
}

async fn insert_get_round_trip(store: &dyn VectorStore) {
    let rec = record("m1", "alice", "I use PostgreSQL 16", unit_vec(0));
    store.insert(rec.clone()).await.unwrap();

    let fetched = store.get("m1").await.unwrap().expect("row should exist");
    assert_eq!(fetched.content, "I use PostgreSQL 16");
    assert_eq!(fetched.owner_id, "alice");
    assert_eq!(fetched.content_hash, rec.memory.content_hash);

    assert!(store.get("missing").await.unwrap().is_none());
}

async fn search_is_owner_scoped(store: &dyn VectorStore) {
    store
        .insert(record("a1", "alice", "alice fact", unit_vec(0)))
        .await
        .unwrap();
    store
        .insert(record("b1", "bob", "bob fact", unit_vec(0)))
        .await
        .unwrap();

    let hits = store.search("alice", &unit_vec(0), 10, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0.id, "a1");
    assert!(hits[0].1 > 0.99);

    let listed = store.list_by_owner("bob").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "b1");

    assert_eq!(store.count_by_owner("alice").await.unwrap(), 1);
}

async fn metadata_filters_are_exact(store: &dyn VectorStore) {
    let mut tagged = record("t1", "alice", "tagged", unit_vec(1));
    tagged
        .memory
        .metadata
        .insert("run_id".to_string(), serde_json::json!("run-7"));
    store.insert(tagged).await.unwrap();
    store
        .insert(record("t2", "alice", "untagged", unit_vec(1)))
        .await
        .unwrap();

    let mut filters = HashMap::new();
    filters.insert("run_id".to_string(), serde_json::json!("run-7"));
    let hits = store
        .search("alice", &unit_vec(1), 10, Some(&filters))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0.id, "t1");

    filters.insert("run_id".to_string(), serde_json::json!("run-8"));
    let hits = store
        .search("alice", &unit_vec(1), 10, Some(&filters))
        .await
        .unwrap();
    assert!(hits.is_empty());
}

async fn update_replaces_content_in_place(store: &dyn VectorStore) {
    store
        .insert(record("u1", "alice", "old content", unit_vec(2)))
        .await
        .unwrap();

    let updated = store
        .update_content("u1", "new content", unit_vec(3))
        .await
        .unwrap();
    assert_eq!(updated.content, "new content");
    assert_eq!(updated.owner_id, "alice");
    assert_eq!(updated.content_hash, content_hash("new content"));

    let fetched = store.get("u1").await.unwrap().unwrap();
    assert_eq!(fetched.content, "new content");

    let err = store
        .update_content("missing", "x", unit_vec(0))
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::NotFound(_)));
}

async fn wrong_dimensionality_is_bad_input(store: &dyn VectorStore) {
    let rec = record("d1", "alice", "short vector", vec![1.0, 2.0]);
    let err = store.insert(rec).await.unwrap_err();
    assert!(matches!(err, MemoryError::BadInput(_)));

    let err = store
        .search("alice", &[1.0, 2.0], 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::BadInput(_)));
}

async fn history_is_append_only_and_ordered(store: &dyn VectorStore) {
    let base = Utc::now();
    for (i, kind) in [HistoryEventKind::Add, HistoryEventKind::Update]
        .into_iter()
        .enumerate()
    {
        store
            .append_history(HistoryEvent {
                memory_id: "h1".to_string(),
                event_kind: kind,
                prev_content: None,
                new_content: Some(format!("v{}", i)),
                timestamp: base + chrono::Duration::milliseconds(i as i64),
            })
            .await
            .unwrap();
    }

    let events = store.history("h1").await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_kind, HistoryEventKind::Add);
    assert_eq!(events[1].event_kind, HistoryEventKind::Update);
    assert!(store.history("other").await.unwrap().is_empty());
}

async fn reset_wipes_everything(store: &dyn VectorStore) {
    store
        .insert(record("r1", "alice", "to be wiped", unit_vec(4)))
        .await
        .unwrap();
    store.reset().await.unwrap();
    assert!(store.get("r1").await.unwrap().is_none());
    assert_eq!(store.count_by_owner("alice").await.unwrap(), 0);
}

macro_rules! conformance_case {
    ($name:ident) => {
        #[tokio::test]
        async fn $name() {
            let store = MemoryVectorStore::new(DIMS);
            super::$name(&store).await;
        }
    };
}

mod memory_backend {
    use super::*;

    conformance_case!(insert_get_round_trip);
    conformance_case!(search_is_owner_scoped);
    conformance_case!(metadata_filters_are_exact);
    conformance_case!(update_replaces_content_in_place);
    conformance_case!(wrong_dimensionality_is_bad_input);
    conformance_case!(history_is_append_only_and_ordered);
    conformance_case!(reset_wipes_everything);
}
