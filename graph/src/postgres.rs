//! Postgres implementation of the graph store
//!
//! Plain relational tables: `graph_nodes` for memory nodes,
//! `graph_edges` for typed edges (endpoints may also name components
//! or decisions), `components` keyed by unique name, and `decisions`
//! with typed rationale arrays.

use crate::store::GraphStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engram_types::{
    Component, Decision, GraphEdge, GraphNode, MemoryError, NodeKind, RelationKind,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

fn store_err(e: sqlx::Error) -> MemoryError {
    MemoryError::StoreUnavailable(e.to_string())
}

pub struct PostgresGraphStore {
    pool: PgPool,
}

impl PostgresGraphStore {
    pub async fn connect(database_url: &str) -> Result<Self, MemoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(store_err)?;

        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    /// Reuse an existing pool (vector and graph stores often share one
    /// database in small deployments)
    pub async fn from_pool(pool: PgPool) -> Result<Self, MemoryError> {
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    async fn bootstrap(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS graph_nodes (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                label TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS graph_nodes_owner_idx ON graph_nodes (owner_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS graph_edges (
                id BIGSERIAL PRIMARY KEY,
                from_id TEXT NOT NULL,
                to_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                tag TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (from_id, to_id, kind)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS graph_edges_from_idx ON graph_edges (from_id)")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS graph_edges_to_idx ON graph_edges (to_id)")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS components (
                name TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                pros TEXT[] NOT NULL DEFAULT '{}',
                cons TEXT[] NOT NULL DEFAULT '{}',
                alternatives TEXT[] NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        info!("graph store ready");
        Ok(())
    }

    fn parse_kind(kind: &str) -> Result<RelationKind, MemoryError> {
        RelationKind::parse(kind)
            .ok_or_else(|| MemoryError::Internal(format!("unknown edge kind: {}", kind)))
    }

    fn edge_from_row(
        (from, to, kind, tag, created_at): (String, String, String, Option<String>, DateTime<Utc>),
    ) -> Result<GraphEdge, MemoryError> {
        Ok(GraphEdge {
            from,
            to,
            kind: Self::parse_kind(&kind)?,
            tag,
            created_at,
        })
    }
}

type EdgeRow = (String, String, String, Option<String>, DateTime<Utc>);

#[async_trait]
impl GraphStore for PostgresGraphStore {
    async fn upsert_memory_node(&self, node: GraphNode) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO graph_nodes (id, kind, owner_id, label, created_at)
            VALUES ($1, 'memory', $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET label = EXCLUDED.label
            "#,
        )
        .bind(&node.id)
        .bind(&node.owner_id)
        .bind(&node.label)
        .bind(node.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        debug!(id = %node.id, "memory node upserted");
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>, MemoryError> {
        let row = sqlx::query_as::<_, (String, String, String, DateTime<Utc>)>(
            "SELECT id, owner_id, label, created_at FROM graph_nodes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|(id, owner_id, label, created_at)| GraphNode {
            id,
            kind: NodeKind::Memory,
            owner_id,
            label,
            created_at,
        }))
    }

    async fn remove_node(&self, id: &str) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM graph_edges WHERE from_id = $1 OR to_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        sqlx::query("DELETE FROM graph_nodes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn add_edge(&self, edge: GraphEdge) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO graph_edges (from_id, to_id, kind, tag, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (from_id, to_id, kind) DO NOTHING
            "#,
        )
        .bind(&edge.from)
        .bind(&edge.to)
        .bind(edge.kind.as_str())
        .bind(&edge.tag)
        .bind(edge.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn edges_from(&self, id: &str) -> Result<Vec<GraphEdge>, MemoryError> {
        let rows = sqlx::query_as::<_, EdgeRow>(
            "SELECT from_id, to_id, kind, tag, created_at FROM graph_edges WHERE from_id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(Self::edge_from_row).collect()
    }

    async fn edges_to(&self, id: &str) -> Result<Vec<GraphEdge>, MemoryError> {
        let rows = sqlx::query_as::<_, EdgeRow>(
            "SELECT from_id, to_id, kind, tag, created_at FROM graph_edges WHERE to_id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(Self::edge_from_row).collect()
    }

    async fn owner_subgraph(
        &self,
        owner_id: &str,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), MemoryError> {
        let node_rows = sqlx::query_as::<_, (String, String, String, DateTime<Utc>)>(
            "SELECT id, owner_id, label, created_at FROM graph_nodes \
             WHERE owner_id = $1 AND kind = 'memory'",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let nodes: Vec<GraphNode> = node_rows
            .into_iter()
            .map(|(id, owner_id, label, created_at)| GraphNode {
                id,
                kind: NodeKind::Memory,
                owner_id,
                label,
                created_at,
            })
            .collect();

        let edge_rows = sqlx::query_as::<_, EdgeRow>(
            r#"
            SELECT e.from_id, e.to_id, e.kind, e.tag, e.created_at
            FROM graph_edges e
            JOIN graph_nodes a ON a.id = e.from_id
            JOIN graph_nodes b ON b.id = e.to_id
            WHERE a.owner_id = $1 AND b.owner_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let edges = edge_rows
            .into_iter()
            .map(Self::edge_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((nodes, edges))
    }

    async fn upsert_component(&self, name: &str, kind: &str) -> Result<Component, MemoryError> {
        let (name, kind, created_at) = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            r#"
            INSERT INTO components (name, kind, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name) DO UPDATE SET kind = EXCLUDED.kind
            RETURNING name, kind, created_at
            "#,
        )
        .bind(name)
        .bind(kind)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(Component {
            name,
            kind,
            created_at,
        })
    }

    async fn get_component(&self, name: &str) -> Result<Option<Component>, MemoryError> {
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT name, kind, created_at FROM components WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|(name, kind, created_at)| Component {
            name,
            kind,
            created_at,
        }))
    }

    async fn list_components(&self) -> Result<Vec<Component>, MemoryError> {
        let rows = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT name, kind, created_at FROM components ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|(name, kind, created_at)| Component {
                name,
                kind,
                created_at,
            })
            .collect())
    }

    async fn describing_memory_count(&self, name: &str) -> Result<u64, MemoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM graph_edges WHERE kind = 'DESCRIBES' AND to_id = $1",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(count as u64)
    }

    async fn create_decision(&self, decision: Decision) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO decisions (id, text, owner_id, pros, cons, alternatives, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&decision.id)
        .bind(&decision.text)
        .bind(&decision.owner_id)
        .bind(&decision.pros)
        .bind(&decision.cons)
        .bind(&decision.alternatives)
        .bind(decision.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_decision(&self, id: &str) -> Result<Option<Decision>, MemoryError> {
        let row = sqlx::query_as::<
            _,
            (
                String,
                String,
                String,
                Vec<String>,
                Vec<String>,
                Vec<String>,
                DateTime<Utc>,
            ),
        >(
            "SELECT id, text, owner_id, pros, cons, alternatives, created_at \
             FROM decisions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(
            |(id, text, owner_id, pros, cons, alternatives, created_at)| Decision {
                id,
                text,
                owner_id,
                pros,
                cons,
                alternatives,
                created_at,
            },
        ))
    }

    async fn reset(&self) -> Result<(), MemoryError> {
        sqlx::query("TRUNCATE graph_nodes, graph_edges, components, decisions")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        info!("graph store reset");
        Ok(())
    }
}
