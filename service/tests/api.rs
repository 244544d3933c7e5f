//! Memory Service API tests over in-memory stores
//!
//! The LLM is scripted per test; embeddings come from the
//! deterministic hash embedder, so everything here runs without
//! external services.

use anyhow::anyhow;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use engram_auth::{CachedValidator, InMemoryTokenStore, NewToken, TokenStore};
use engram_config::TrustWeights;
use engram_graph::{GraphStore, InMemoryGraphStore, IntelligenceEngine};
use engram_providers::{DeterministicEmbedder, FactExtractor, LlmProvider};
use engram_service::{
    build_router, spawn_projection_pool, AppState, MemoryPipeline, ProjectionConfig,
};
use engram_store::{MemoryVectorStore, VectorStore};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower::ServiceExt;

const DIMS: usize = 16;

/// LLM stub that replays canned extraction replies in order
struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| anyhow!("scripted LLM exhausted"))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct TestApp {
    router: Router,
    vector_store: Arc<MemoryVectorStore>,
    graph_store: Arc<InMemoryGraphStore>,
    auth: Arc<CachedValidator>,
}

fn build_app(llm: Arc<dyn LlmProvider>) -> TestApp {
    let vector_store = Arc::new(MemoryVectorStore::new(DIMS));
    let graph_store = Arc::new(InMemoryGraphStore::new());
    let engine = Arc::new(IntelligenceEngine::new(
        graph_store.clone() as Arc<dyn GraphStore>,
        TrustWeights::default(),
    ));
    let auth = Arc::new(CachedValidator::new(
        Arc::new(InMemoryTokenStore::new()) as Arc<dyn TokenStore>
    ));

    let projection = spawn_projection_pool(
        ProjectionConfig {
            workers: 2,
            max_attempts: 7,
            base_delay: Duration::from_millis(5),
        },
        vector_store.clone() as Arc<dyn VectorStore>,
        engine.clone(),
    );

    let pipeline = Arc::new(MemoryPipeline::new(
        vector_store.clone() as Arc<dyn VectorStore>,
        Arc::new(DeterministicEmbedder::new(DIMS)),
        FactExtractor::new(llm),
        engine.clone(),
        projection,
        // Accept the nearest neighbor unconditionally so scripted
        // UPDATE items resolve under the hash embedder.
        -1.0,
    ));

    let router = build_router(AppState {
        pipeline,
        engine,
        auth: auth.clone(),
    });

    TestApp {
        router,
        vector_store,
        graph_store,
        auth,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn post_json(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

async fn ingest(router: &Router, user: &str, text: &str) -> Value {
    let (status, body) = send(
        router,
        post_json(
            "/memories",
            json!({
                "messages": [{"role": "user", "content": text}],
                "user_id": user,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "ingest failed: {}", body);
    body
}

#[tokio::test]
async fn insert_then_get_round_trips_content_and_metadata() {
    let app = build_app(ScriptedLlm::new(vec![
        r#"[{"content": "I use PostgreSQL 16", "action": "ADD"}]"#,
    ]));

    let (status, body) = send(
        &app.router,
        post_json(
            "/memories",
            json!({
                "messages": [{"role": "user", "content": "for storage I use PostgreSQL 16"}],
                "user_id": "alice",
                "metadata": {"topic": "storage"},
                "run_id": "run-1",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["event"], "ADD");
    assert_eq!(body["relations"], json!([]));
    let id = body["results"][0]["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&app.router, get(&format!("/memories/{}?user_id=alice", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["memory"], "I use PostgreSQL 16");
    assert_eq!(fetched["metadata"]["topic"], "storage");
    assert_eq!(fetched["metadata"]["run_id"], "run-1");
}

#[tokio::test]
async fn ownership_boundary_returns_access_denied_not_not_found() {
    let app = build_app(ScriptedLlm::new(vec![
        r#"[{"content": "I use PostgreSQL 16", "action": "ADD"}]"#,
    ]));

    let body = ingest(&app.router, "alice", "I use PostgreSQL 16").await;
    let id = body["results"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app.router, get(&format!("/memories/{}?user_id=bob", id))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["detail"],
        format!("Access denied: Memory {} does not belong to user bob", id)
    );
    assert_eq!(body["code"], "access_denied");

    // DELETE and history hit the same wall
    let (status, _) = send(
        &app.router,
        Request::builder()
            .method("DELETE")
            .uri(format!("/memories/{}?user_id=bob", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app.router,
        get(&format!("/memories/{}/history?user_id=bob", id)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A genuinely absent id is not_found for its owner
    let (status, body) = send(&app.router, get("/memories/ghost?user_id=bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn search_only_returns_the_callers_memories() {
    let app = build_app(ScriptedLlm::new(vec![
        r#"[{"content": "I prefer async/await over callbacks in JavaScript", "action": "ADD"}]"#,
        r#"[{"content": "I prefer promises in JavaScript", "action": "ADD"}]"#,
    ]));

    ingest(&app.router, "alice", "async/await please").await;
    ingest(&app.router, "bob", "promises please").await;

    let (status, body) = send(
        &app.router,
        post_json(
            "/search",
            json!({"query": "async programming", "user_id": "alice", "limit": 5}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0]["memory"],
        "I prefer async/await over callbacks in JavaScript"
    );
}

#[tokio::test]
async fn put_then_get_returns_new_content_with_one_update_event() {
    let app = build_app(ScriptedLlm::new(vec![
        r#"[{"content": "I deploy with Docker", "action": "ADD"}]"#,
    ]));

    let body = ingest(&app.router, "alice", "deploying with docker").await;
    let id = body["results"][0]["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &app.router,
        Request::builder()
            .method("PUT")
            .uri(format!("/memories/{}", id))
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"user_id": "alice", "content": "I deploy with Podman"}).to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["memory"], "I deploy with Podman");

    let (_, history) = send(
        &app.router,
        get(&format!("/memories/{}/history?user_id=alice", id)),
    )
    .await;
    let events = history.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event_kind"], "ADD");
    assert_eq!(events[1]["event_kind"], "UPDATE");
    assert_eq!(events[1]["prev_content"], "I deploy with Docker");
    assert_eq!(events[1]["new_content"], "I deploy with Podman");
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let app = build_app(ScriptedLlm::new(vec![
        r#"[{"content": "ephemeral fact", "action": "ADD"}]"#,
    ]));

    let body = ingest(&app.router, "alice", "something ephemeral").await;
    let id = body["results"][0]["id"].as_str().unwrap().to_string();

    let (status, deleted) = send(
        &app.router,
        Request::builder()
            .method("DELETE")
            .uri(format!("/memories/{}?user_id=alice", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], true);

    let (status, _) = send(&app.router, get(&format!("/memories/{}?user_id=alice", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The DELETE event survives administratively in the history store
    let events = app.vector_store.history(&id).await.unwrap();
    assert_eq!(events.last().unwrap().event_kind.as_str(), "DELETE");
}

#[tokio::test]
async fn projection_retries_until_the_graph_store_recovers() {
    let app = build_app(ScriptedLlm::new(vec![
        r#"[{"content": "projection survives flakiness", "action": "ADD"}]"#,
    ]));

    // First three graph operations fail, then the store recovers
    app.graph_store.fail_next(3).await;

    let started = std::time::Instant::now();
    let body = ingest(&app.router, "alice", "flaky graph").await;
    // The synchronous response does not wait for projection
    assert!(started.elapsed() < Duration::from_secs(1));
    let id = body["results"][0]["id"].as_str().unwrap().to_string();

    // Within the retry budget the node appears
    let mut projected = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if app.graph_store.get_node(&id).await.ok().flatten().is_some() {
            projected = true;
            break;
        }
    }
    assert!(projected, "memory node never appeared in the graph");

    let (status, related) = send(
        &app.router,
        get(&format!("/graph/related/{}?user_id=alice&depth=1", id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(related, json!([]));
}

#[tokio::test]
async fn supersession_updates_in_place_with_add_then_update_history() {
    let app = build_app(ScriptedLlm::new(vec![
        r#"[{"content": "User prefers class components", "action": "ADD"}]"#,
        r#"[{"content": "User strongly prefers hooks", "action": "UPDATE"}]"#,
    ]));

    let first = ingest(&app.router, "alice", "I like class components").await;
    let id = first["results"][0]["id"].as_str().unwrap().to_string();

    let second = ingest(&app.router, "alice", "actually hooks now, strongly").await;
    assert_eq!(second["results"][0]["event"], "UPDATE");
    assert_eq!(second["results"][0]["id"], id.as_str());

    let (_, fetched) = send(&app.router, get(&format!("/memories/{}?user_id=alice", id))).await;
    assert_eq!(fetched["memory"], "User strongly prefers hooks");

    let (_, history) = send(
        &app.router,
        get(&format!("/memories/{}/history?user_id=alice", id)),
    )
    .await;
    let kinds: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event_kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["ADD", "UPDATE"]);
}

#[tokio::test]
async fn extractor_failure_fails_the_call_without_partial_writes() {
    let app = build_app(ScriptedLlm::new(vec![]));

    let (status, body) = send(
        &app.router,
        post_json(
            "/memories",
            json!({
                "messages": [{"role": "user", "content": "anything"}],
                "user_id": "alice",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "provider_unavailable");
    assert_eq!(app.vector_store.count_by_owner("alice").await.unwrap(), 0);
}

#[tokio::test]
async fn empty_messages_are_bad_input() {
    let app = build_app(ScriptedLlm::new(vec![]));
    let (status, body) = send(
        &app.router,
        post_json("/memories", json!({"messages": [], "user_id": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_input");
}

#[tokio::test]
async fn reset_requires_the_admin_permission() {
    let app = build_app(ScriptedLlm::new(vec![
        r#"[{"content": "to be wiped", "action": "ADD"}]"#,
    ]));
    ingest(&app.router, "alice", "wipe me").await;

    let plain = app
        .auth
        .create_token(NewToken {
            user_id: "alice".into(),
            display_name: "Alice".into(),
            email: "alice@example.com".into(),
            expires_at: None,
            permissions: vec![],
        })
        .await
        .unwrap();
    let admin = app
        .auth
        .create_token(NewToken {
            user_id: "root".into(),
            display_name: "Root".into(),
            email: "root@example.com".into(),
            expires_at: None,
            permissions: vec!["admin".into()],
        })
        .await
        .unwrap();

    // Missing headers
    let (status, _) = send(&app.router, post_json("/reset", json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Valid token without the admin tag
    let (status, _) = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri("/reset")
            .header("content-type", "application/json")
            .header("X-API-Token", plain.token.as_str())
            .header("X-API-UserID", "alice")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.vector_store.count_by_owner("alice").await.unwrap(), 1);

    // Admin token wipes both stores
    let (status, body) = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri("/reset")
            .header("content-type", "application/json")
            .header("X-API-Token", admin.token.as_str())
            .header("X-API-UserID", "root")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reset"], true);
    assert_eq!(app.vector_store.count_by_owner("alice").await.unwrap(), 0);
}

#[tokio::test]
async fn graph_sync_reprojects_every_memory() {
    let app = build_app(ScriptedLlm::new(vec![
        r#"[{"content": "fact one", "action": "ADD"}]"#,
        r#"[{"content": "fact two", "action": "ADD"}]"#,
    ]));

    let a = ingest(&app.router, "alice", "one").await;
    let b = ingest(&app.router, "alice", "two").await;
    let ids = [
        a["results"][0]["id"].as_str().unwrap().to_string(),
        b["results"][0]["id"].as_str().unwrap().to_string(),
    ];

    // Wait for the initial projections, then wipe the graph behind the
    // service's back and re-sync.
    tokio::time::sleep(Duration::from_millis(100)).await;
    app.graph_store.reset().await.unwrap();

    let (status, body) = send(&app.router, post_json("/graph/sync", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduled"], 2);

    let mut restored = 0;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        restored = 0;
        for id in &ids {
            if app.graph_store.get_node(id).await.ok().flatten().is_some() {
                restored += 1;
            }
        }
        if restored == 2 {
            break;
        }
    }
    assert_eq!(restored, 2);
}
