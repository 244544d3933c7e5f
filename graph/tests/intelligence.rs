//! Intelligence engine tests over the in-memory graph store

use chrono::{Duration, Utc};
use engram_config::TrustWeights;
use engram_graph::{GraphStore, InMemoryGraphStore, IntelligenceEngine};
use engram_types::{GraphNode, Memory, MemoryError, NodeKind, RelationKind};
use std::collections::HashMap;
use std::sync::Arc;

fn engine() -> IntelligenceEngine {
    IntelligenceEngine::new(Arc::new(InMemoryGraphStore::new()), TrustWeights::default())
}

async fn add_memory_node(engine: &IntelligenceEngine, id: &str, owner: &str, content: &str) {
    engine
        .store()
        .upsert_memory_node(GraphNode {
            id: id.to_string(),
            kind: NodeKind::Memory,
            owner_id: owner.to_string(),
            label: content.to_string(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn traversal_respects_depth_and_excludes_origin() {
    let engine = engine();
    for (id, content) in [("m1", "a"), ("m2", "b"), ("m3", "c"), ("m4", "d")] {
        add_memory_node(&engine, id, "alice", content).await;
    }
    // Chain m1 -> m2 -> m3 -> m4
    engine
        .link_memories("alice", "m1", "m2", RelationKind::RelatesTo)
        .await
        .unwrap();
    engine
        .link_memories("alice", "m2", "m3", RelationKind::Extends)
        .await
        .unwrap();
    engine
        .link_memories("alice", "m3", "m4", RelationKind::RelatesTo)
        .await
        .unwrap();

    let related = engine
        .related_memories("alice", "m1", Some(2))
        .await
        .unwrap();
    let ids: Vec<&str> = related.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["m2", "m3"]);
    assert_eq!(related[0].distance, 1);
    assert_eq!(related[1].distance, 2);
    assert_eq!(related[1].relation, RelationKind::Extends);

    // Default depth is 2
    let default_related = engine.related_memories("alice", "m1", None).await.unwrap();
    assert_eq!(default_related.len(), 2);
}

#[tokio::test]
async fn linking_foreign_memories_is_denied() {
    let engine = engine();
    add_memory_node(&engine, "a1", "alice", "alice fact").await;
    add_memory_node(&engine, "b1", "bob", "bob fact").await;

    let err = engine
        .link_memories("alice", "a1", "b1", RelationKind::RelatesTo)
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::AccessDenied(_)));

    let err = engine
        .link_memories("alice", "a1", "missing", RelationKind::RelatesTo)
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::NotFound(_)));

    let err = engine
        .link_memories("alice", "a1", "a1", RelationKind::Describes)
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::BadInput(_)));
}

#[tokio::test]
async fn shortest_path_is_found_and_labelled() {
    let engine = engine();
    for id in ["p1", "p2", "p3", "p4"] {
        add_memory_node(&engine, id, "alice", id).await;
    }
    // Long way p1->p2->p3->p4 and shortcut p1->p4
    for (a, b) in [("p1", "p2"), ("p2", "p3"), ("p3", "p4")] {
        engine
            .link_memories("alice", a, b, RelationKind::RelatesTo)
            .await
            .unwrap();
    }
    engine
        .link_memories("alice", "p1", "p4", RelationKind::RespondsTo)
        .await
        .unwrap();

    let path = engine.find_path("p1", "p4").await.unwrap();
    assert_eq!(path.len(), 1);
    assert_eq!(path[0].kind, RelationKind::RespondsTo);

    let no_path = engine.find_path("p1", "unconnected").await.unwrap();
    assert!(no_path.is_empty());
}

#[tokio::test]
async fn superseded_memories_are_flagged() {
    let engine = engine();
    add_memory_node(&engine, "old", "alice", "class components").await;
    add_memory_node(&engine, "new", "alice", "hooks").await;
    engine
        .link_memories("alice", "new", "old", RelationKind::Supersedes)
        .await
        .unwrap();

    let superseded = engine.find_superseded_memories("alice").await.unwrap();
    assert_eq!(superseded.len(), 1);
    assert_eq!(superseded[0].id, "old");

    let report = engine.intelligence_report("alice").await.unwrap();
    assert_eq!(report.summary.obsolete_memories, 1);
}

#[tokio::test]
async fn evolution_follows_topic_and_supersession() {
    let engine = engine();
    add_memory_node(&engine, "e1", "alice", "I use React class components").await;
    add_memory_node(&engine, "e2", "alice", "hooks are the way now").await;
    add_memory_node(&engine, "e3", "alice", "I like SQL").await;
    engine
        .link_memories("alice", "e1", "e2", RelationKind::Supersedes)
        .await
        .unwrap();

    let evolution = engine
        .memory_evolution("alice", "react", None, None)
        .await
        .unwrap();
    let ids: Vec<&str> = evolution.iter().map(|n| n.id.as_str()).collect();
    // e1 matches by substring, e2 through the SUPERSEDES link, e3 not at all
    assert!(ids.contains(&"e1"));
    assert!(ids.contains(&"e2"));
    assert!(!ids.contains(&"e3"));
}

#[tokio::test]
async fn impact_analysis_walks_reverse_dependencies() {
    let engine = engine();
    for name in ["database", "api", "frontend", "batch"] {
        engine.create_component(name, "Service").await.unwrap();
    }
    // api depends on database, frontend depends on api, batch depends on database
    engine
        .link_component_dependency("api", "database", None)
        .await
        .unwrap();
    engine
        .link_component_dependency("frontend", "api", Some("http".to_string()))
        .await
        .unwrap();
    engine
        .link_component_dependency("batch", "database", None)
        .await
        .unwrap();

    add_memory_node(&engine, "m-api", "alice", "api notes").await;
    engine
        .link_memory_to_component("alice", "m-api", "api")
        .await
        .unwrap();

    let impact = engine.impact_analysis("database").await.unwrap();
    let names: Vec<&str> = impact.impacted.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["api", "batch", "frontend"]);

    let api = impact.impacted.iter().find(|c| c.name == "api").unwrap();
    assert_eq!(api.distance, 1);
    assert_eq!(api.describing_memories, 1);
    let frontend = impact.impacted.iter().find(|c| c.name == "frontend").unwrap();
    assert_eq!(frontend.distance, 2);

    let err = engine.impact_analysis("unknown").await.unwrap_err();
    assert!(matches!(err, MemoryError::NotFound(_)));
}

#[tokio::test]
async fn decision_rationale_includes_justifying_memories() {
    let engine = engine();
    let decision = engine
        .create_decision(
            "alice",
            "Use PostgreSQL",
            vec!["mature".into(), "pgvector".into()],
            vec!["ops burden".into()],
            vec!["SQLite".into()],
        )
        .await
        .unwrap();

    add_memory_node(&engine, "j1", "alice", "we benchmarked postgres").await;
    let mut metadata = HashMap::new();
    metadata.insert("decision_id".to_string(), serde_json::json!(decision.id));
    let memory = Memory {
        id: "j1".to_string(),
        owner_id: "alice".to_string(),
        content: "we benchmarked postgres".to_string(),
        metadata,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        content_hash: "h".to_string(),
    };
    engine.project_memory(&memory).await.unwrap();

    let (fetched, justified) = engine.decision_rationale(&decision.id).await.unwrap();
    assert_eq!(fetched.pros.len(), 2);
    assert_eq!(fetched.cons, vec!["ops burden".to_string()]);
    assert_eq!(justified.len(), 1);
    assert_eq!(justified[0].id, "j1");
    assert_eq!(justified[0].relation, RelationKind::Justifies);
}

#[tokio::test]
async fn communities_partition_disjoint_clusters_deterministically() {
    let engine = engine();
    // Two triangles with no connection between them
    for id in ["c1", "c2", "c3", "d1", "d2", "d3"] {
        add_memory_node(&engine, id, "alice", id).await;
    }
    for (a, b) in [
        ("c1", "c2"),
        ("c2", "c3"),
        ("c3", "c1"),
        ("d1", "d2"),
        ("d2", "d3"),
        ("d3", "d1"),
    ] {
        engine
            .link_memories("alice", a, b, RelationKind::RelatesTo)
            .await
            .unwrap();
    }

    let first = engine.detect_communities("alice").await.unwrap();
    let second = engine.detect_communities("alice").await.unwrap();

    let sizes: Vec<usize> = first.iter().map(|c| c.member_ids.len()).collect();
    assert_eq!(sizes, vec![3, 3]);
    // Deterministic: identical partition on every run
    assert_eq!(
        first.iter().map(|c| &c.member_ids).collect::<Vec<_>>(),
        second.iter().map(|c| &c.member_ids).collect::<Vec<_>>()
    );
    // Members never straddle the two triangles
    for community in &first {
        let in_c = community.member_ids.iter().filter(|m| m.starts_with('c')).count();
        assert!(in_c == 0 || in_c == community.member_ids.len());
    }
}

#[tokio::test]
async fn trust_score_rewards_citations_and_punishes_conflicts() {
    let engine = engine();
    let now = Utc::now();
    for id in ["t1", "t2", "t3", "t4"] {
        add_memory_node(&engine, id, "alice", id).await;
    }
    // t2 and t3 cite t1; t4 conflicts with t1
    engine
        .link_memories("alice", "t2", "t1", RelationKind::RespondsTo)
        .await
        .unwrap();
    engine
        .link_memories("alice", "t3", "t1", RelationKind::Extends)
        .await
        .unwrap();
    engine
        .link_memories("alice", "t4", "t1", RelationKind::ConflictsWith)
        .await
        .unwrap();

    let cited = engine.trust_score_at("t1", now).await.unwrap();
    let uncited = engine.trust_score_at("t2", now).await.unwrap();
    let conflicted = engine.trust_score_at("t4", now).await.unwrap();

    assert!((0.0..=1.0).contains(&cited));
    assert!(cited > uncited); // citations outweigh the conflict penalty here
    assert!(conflicted < uncited); // the conflicting node pays too

    // Deterministic given the same graph state and clock
    let again = engine.trust_score_at("t1", now).await.unwrap();
    assert_eq!(cited, again);

    // Recency decays with a 90-day half-life
    let aged = engine
        .trust_score_at("t2", now + Duration::days(365))
        .await
        .unwrap();
    assert!(aged < uncited);
}

#[tokio::test]
async fn intelligence_report_summarizes_the_subgraph() {
    let engine = engine();
    for id in ["r1", "r2", "r3", "lonely"] {
        add_memory_node(&engine, id, "alice", id).await;
    }
    engine
        .link_memories("alice", "r1", "r2", RelationKind::RelatesTo)
        .await
        .unwrap();
    engine
        .link_memories("alice", "r2", "r3", RelationKind::ConflictsWith)
        .await
        .unwrap();

    let report = engine.intelligence_report("alice").await.unwrap();
    assert_eq!(report.summary.total_memories, 4);
    assert_eq!(report.summary.isolated_memories, 1);
    assert_eq!(report.insights.conflicting_knowledge.len(), 1);
    assert!((0.0..=10.0).contains(&report.summary.knowledge_health_score));
    assert!(!report.recommendations.is_empty());
    // Central memories exclude the isolated node
    assert!(!report.insights.central_memories.contains(&"lonely".to_string()));

    // Deterministic given the same graph state
    let again = engine.intelligence_report("alice").await.unwrap();
    assert_eq!(
        report.summary.knowledge_health_score,
        again.summary.knowledge_health_score
    );

    // An empty owner scores a perfect 10
    let empty = engine.intelligence_report("nobody").await.unwrap();
    assert_eq!(empty.summary.knowledge_health_score, 10.0);
    assert_eq!(empty.summary.total_memories, 0);
}

#[tokio::test]
async fn projection_is_idempotent_and_attaches_components() {
    let engine = engine();
    engine.create_component("auth", "Service").await.unwrap();

    let mut metadata = HashMap::new();
    metadata.insert("components".to_string(), serde_json::json!(["auth", "ghost"]));
    let memory = Memory {
        id: "pm1".to_string(),
        owner_id: "alice".to_string(),
        content: "auth uses argon2".to_string(),
        metadata,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        content_hash: "h".to_string(),
    };

    engine.project_memory(&memory).await.unwrap();
    engine.project_memory(&memory).await.unwrap();

    let node = engine.store().get_node("pm1").await.unwrap().unwrap();
    assert_eq!(node.owner_id, "alice");
    // Only the existing component got a DESCRIBES edge, exactly once
    assert_eq!(engine.store().describing_memory_count("auth").await.unwrap(), 1);
    assert_eq!(engine.store().describing_memory_count("ghost").await.unwrap(), 0);
}
