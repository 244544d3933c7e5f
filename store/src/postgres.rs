//! Postgres + pgvector implementation of the vector store

use crate::vector_store::{content_hash, SearchFilters, VectorStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engram_config::IndexStrategy;
use engram_types::{HistoryEvent, HistoryEventKind, Memory, MemoryError, MemoryRecord};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::{debug, info, warn};

fn store_err(e: sqlx::Error) -> MemoryError {
    MemoryError::StoreUnavailable(e.to_string())
}

/// Database-backed vector store using the pgvector extension
pub struct PostgresVectorStore {
    pool: PgPool,
    dimensions: usize,
    strategy: IndexStrategy,
}

impl PostgresVectorStore {
    /// Connect, verify the schema, and apply the index strategy. Fails
    /// hard when existing rows carry a different dimensionality than
    /// the configured one.
    pub async fn connect(
        database_url: &str,
        dimensions: usize,
        strategy: IndexStrategy,
    ) -> Result<Self, MemoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(store_err)?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(store_err)?;

        let store = Self {
            pool,
            dimensions,
            strategy,
        };
        store.bootstrap().await?;
        Ok(store)
    }

    /// Create the schema and index if missing, then verify stored rows
    /// match the configured dimensionality.
    async fn bootstrap(&self) -> Result<(), MemoryError> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        // Dimensionality is part of the column type, so DDL is built
        // with the configured D rather than a bind parameter.
        let create_memories = format!(
            r#"
            CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding vector({}),
                metadata JSONB NOT NULL DEFAULT '{{}}',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                content_hash TEXT NOT NULL
            )
            "#,
            self.dimensions
        );
        sqlx::query(&create_memories)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS memories_owner_idx ON memories (owner_id)")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory_history (
                id BIGSERIAL PRIMARY KEY,
                memory_id TEXT NOT NULL,
                event_kind TEXT NOT NULL,
                prev_content TEXT,
                new_content TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS memory_history_memory_idx ON memory_history (memory_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        self.verify_dimensions().await?;
        self.apply_index_strategy().await?;

        info!(
            dimensions = self.dimensions,
            strategy = self.strategy.as_str(),
            "vector store ready"
        );
        Ok(())
    }

    /// Heterogeneous dimensionality is a fatal startup error, never a
    /// runtime surprise during the first query.
    async fn verify_dimensions(&self) -> Result<(), MemoryError> {
        let stored: Option<i32> =
            sqlx::query_scalar("SELECT vector_dims(embedding) FROM memories LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;

        if let Some(stored) = stored {
            if stored as usize != self.dimensions {
                return Err(MemoryError::StoreUnavailable(format!(
                    "stored embeddings have dimension {} but EMBEDDING_DIMS is {}",
                    stored, self.dimensions
                )));
            }
        }
        Ok(())
    }

    async fn apply_index_strategy(&self) -> Result<(), MemoryError> {
        match self.strategy {
            IndexStrategy::Hnsw => {
                sqlx::query(
                    "CREATE INDEX IF NOT EXISTS memories_embedding_idx \
                     ON memories USING hnsw (embedding vector_cosine_ops)",
                )
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
            }
            IndexStrategy::ExactScan => {
                // Above the HNSW dimension cap the planner falls back
                // to a sequential scan; make sure no stale index from a
                // previous configuration shadows that.
                sqlx::query("DROP INDEX IF EXISTS memories_embedding_idx")
                    .execute(&self.pool)
                    .await
                    .map_err(store_err)?;
                warn!(
                    dimensions = self.dimensions,
                    "dimensionality exceeds the HNSW cap, using exact scan"
                );
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_memory(row: &PgRow) -> Result<Memory, MemoryError> {
        let metadata_value: serde_json::Value = row.try_get("metadata").map_err(store_err)?;
        let metadata: HashMap<String, serde_json::Value> = metadata_value
            .as_object()
            .map(|obj| obj.clone().into_iter().collect())
            .unwrap_or_default();

        Ok(Memory {
            id: row.try_get("id").map_err(store_err)?,
            owner_id: row.try_get("owner_id").map_err(store_err)?,
            content: row.try_get("content").map_err(store_err)?,
            metadata,
            created_at: row.try_get("created_at").map_err(store_err)?,
            updated_at: row.try_get("updated_at").map_err(store_err)?,
            content_hash: row.try_get("content_hash").map_err(store_err)?,
        })
    }
}

const MEMORY_COLUMNS: &str =
    "id, owner_id, content, metadata, created_at, updated_at, content_hash";

#[async_trait]
impl VectorStore for PostgresVectorStore {
    async fn insert(&self, record: MemoryRecord) -> Result<(), MemoryError> {
        if record.embedding.len() != self.dimensions {
            return Err(MemoryError::BadInput(format!(
                "embedding dimension {} does not match configured {}",
                record.embedding.len(),
                self.dimensions
            )));
        }

        let memory = &record.memory;
        let metadata = serde_json::Value::Object(
            memory
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );

        sqlx::query(
            r#"
            INSERT INTO memories
                (id, owner_id, content, embedding, metadata, created_at, updated_at, content_hash)
            VALUES ($1, $2, $3, $4::vector, $5, $6, $7, $8)
            "#,
        )
        .bind(&memory.id)
        .bind(&memory.owner_id)
        .bind(&memory.content)
        .bind(&record.embedding)
        .bind(metadata)
        .bind(memory.created_at)
        .bind(memory.updated_at)
        .bind(&memory.content_hash)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        debug!(id = %memory.id, owner = %memory.owner_id, "memory inserted");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Memory>, MemoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM memories WHERE id = $1",
            MEMORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.as_ref().map(Self::row_to_memory).transpose()
    }

    async fn update_content(
        &self,
        id: &str,
        content: &str,
        embedding: Vec<f32>,
    ) -> Result<Memory, MemoryError> {
        if embedding.len() != self.dimensions {
            return Err(MemoryError::BadInput(format!(
                "embedding dimension {} does not match configured {}",
                embedding.len(),
                self.dimensions
            )));
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE memories
            SET content = $2, embedding = $3::vector, content_hash = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MEMORY_COLUMNS
        ))
        .bind(id)
        .bind(content)
        .bind(&embedding)
        .bind(content_hash(content))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match row {
            Some(row) => Self::row_to_memory(&row),
            None => Err(MemoryError::NotFound(format!("Memory {} not found", id))),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM memories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn search(
        &self,
        owner_id: &str,
        embedding: &[f32],
        limit: usize,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<(Memory, f32)>, MemoryError> {
        if embedding.len() != self.dimensions {
            return Err(MemoryError::BadInput(format!(
                "query embedding dimension {} does not match configured {}",
                embedding.len(),
                self.dimensions
            )));
        }

        // JSONB containment gives exact-match semantics for every
        // supplied filter key.
        let filter_clause = if filters.map(|f| !f.is_empty()).unwrap_or(false) {
            "AND metadata @> $4::jsonb"
        } else {
            ""
        };

        let query_sql = format!(
            r#"
            SELECT {}, 1 - (embedding <=> $1::vector) AS score
            FROM memories
            WHERE owner_id = $2 {}
            ORDER BY embedding <=> $1::vector ASC, created_at DESC
            LIMIT $3
            "#,
            MEMORY_COLUMNS, filter_clause
        );

        let embedding_vec: Vec<f32> = embedding.to_vec();
        let mut query = sqlx::query(&query_sql)
            .bind(&embedding_vec)
            .bind(owner_id)
            .bind(limit as i64);

        if let Some(filters) = filters {
            if !filters.is_empty() {
                let filter_json = serde_json::Value::Object(
                    filters.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                );
                query = query.bind(filter_json);
            }
        }

        let rows = query.fetch_all(&self.pool).await.map_err(store_err)?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let memory = Self::row_to_memory(row)?;
            let score: f64 = row.try_get("score").map_err(store_err)?;
            results.push((memory, score as f32));
        }

        debug!(owner = %owner_id, hits = results.len(), "vector search");
        Ok(results)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Memory>, MemoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM memories WHERE owner_id = $1 ORDER BY created_at DESC",
            MEMORY_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter().map(Self::row_to_memory).collect()
    }

    async fn count_by_owner(&self, owner_id: &str) -> Result<u64, MemoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memories WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count as u64)
    }

    async fn all_ids(&self) -> Result<Vec<(String, String)>, MemoryError> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT id, owner_id FROM memories")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows)
    }

    async fn append_history(&self, event: HistoryEvent) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO memory_history (memory_id, event_kind, prev_content, new_content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&event.memory_id)
        .bind(event.event_kind.as_str())
        .bind(&event.prev_content)
        .bind(&event.new_content)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn history(&self, memory_id: &str) -> Result<Vec<HistoryEvent>, MemoryError> {
        let rows = sqlx::query_as::<_, (String, Option<String>, Option<String>, DateTime<Utc>)>(
            r#"
            SELECT event_kind, prev_content, new_content, created_at
            FROM memory_history
            WHERE memory_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(memory_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut events = Vec::with_capacity(rows.len());
        for (kind, prev_content, new_content, timestamp) in rows {
            let event_kind = HistoryEventKind::parse(&kind).ok_or_else(|| {
                MemoryError::Internal(format!("unknown history event kind: {}", kind))
            })?;
            events.push(HistoryEvent {
                memory_id: memory_id.to_string(),
                event_kind,
                prev_content,
                new_content,
                timestamp,
            });
        }
        Ok(events)
    }

    async fn reset(&self) -> Result<(), MemoryError> {
        sqlx::query("TRUNCATE memories, memory_history")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        info!("vector store reset");
        Ok(())
    }
}
