//! Postgres token store

use crate::token::generate_token;
use crate::tokens::{check_token, NewToken, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engram_types::{AuditAction, AuditEvent, AuthToken, MemoryError, TokenStats};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{info, warn};

fn store_err(e: sqlx::Error) -> MemoryError {
    MemoryError::StoreUnavailable(e.to_string())
}

pub struct PostgresTokenStore {
    pool: PgPool,
}

impl PostgresTokenStore {
    pub async fn connect(database_url: &str) -> Result<Self, MemoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(store_err)?;
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self, MemoryError> {
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    async fn bootstrap(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_tokens (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                display_name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT '',
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                expires_at TIMESTAMPTZ,
                last_used_at TIMESTAMPTZ,
                permissions JSONB NOT NULL DEFAULT '[]'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS auth_tokens_user_idx ON auth_tokens (user_id)")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_audit (
                id BIGSERIAL PRIMARY KEY,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                user_id TEXT NOT NULL,
                token TEXT NOT NULL,
                action TEXT NOT NULL,
                error_message TEXT,
                client_info JSONB
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        info!("auth store ready");
        Ok(())
    }

    fn row_to_token(row: &PgRow) -> Result<AuthToken, MemoryError> {
        let permissions_value: serde_json::Value =
            row.try_get("permissions").map_err(store_err)?;
        let permissions: Vec<String> = permissions_value
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(AuthToken {
            token: row.try_get("token").map_err(store_err)?,
            user_id: row.try_get("user_id").map_err(store_err)?,
            display_name: row.try_get("display_name").map_err(store_err)?,
            email: row.try_get("email").map_err(store_err)?,
            enabled: row.try_get("enabled").map_err(store_err)?,
            created_at: row.try_get("created_at").map_err(store_err)?,
            expires_at: row.try_get("expires_at").map_err(store_err)?,
            last_used_at: row.try_get("last_used_at").map_err(store_err)?,
            permissions,
        })
    }

    /// Append an audit row. Awaited before any validation result is
    /// handed back, which makes the row durable first.
    async fn append_audit(
        &self,
        user_id: &str,
        token: &str,
        action: AuditAction,
        error_message: Option<&str>,
        client_info: Option<&serde_json::Value>,
    ) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO auth_audit (timestamp, user_id, token, action, error_message, client_info)
            VALUES (NOW(), $1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(action.as_str())
        .bind(error_message)
        .bind(client_info)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

const TOKEN_COLUMNS: &str = "token, user_id, display_name, email, enabled, created_at, \
                             expires_at, last_used_at, permissions";

#[async_trait]
impl TokenStore for PostgresTokenStore {
    async fn create_token(&self, new: NewToken) -> Result<AuthToken, MemoryError> {
        let token_value = generate_token();
        let permissions = serde_json::json!(new.permissions);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO auth_tokens
                (token, user_id, display_name, email, enabled, created_at, expires_at, permissions)
            VALUES ($1, $2, $3, $4, TRUE, NOW(), $5, $6)
            RETURNING {}
            "#,
            TOKEN_COLUMNS
        ))
        .bind(&token_value)
        .bind(&new.user_id)
        .bind(&new.display_name)
        .bind(&new.email)
        .bind(new.expires_at)
        .bind(permissions)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        info!(user = %new.user_id, "token issued");
        Self::row_to_token(&row)
    }

    async fn get_token(&self, token: &str) -> Result<Option<AuthToken>, MemoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM auth_tokens WHERE token = $1",
            TOKEN_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.as_ref().map(Self::row_to_token).transpose()
    }

    async fn validate(
        &self,
        token: &str,
        user_id_header: &str,
        client_info: Option<serde_json::Value>,
    ) -> Result<AuthToken, MemoryError> {
        let row = self.get_token(token).await?;

        match check_token(row, user_id_header, Utc::now()) {
            Ok(valid) => {
                sqlx::query("UPDATE auth_tokens SET last_used_at = NOW() WHERE token = $1")
                    .bind(token)
                    .execute(&self.pool)
                    .await
                    .map_err(store_err)?;
                self.append_audit(
                    user_id_header,
                    token,
                    AuditAction::Success,
                    None,
                    client_info.as_ref(),
                )
                .await?;
                Ok(valid)
            }
            Err((action, message)) => {
                warn!(user = %user_id_header, action = action.as_str(), "authentication failed");
                self.append_audit(
                    user_id_header,
                    token,
                    action,
                    Some(&message),
                    client_info.as_ref(),
                )
                .await?;
                Err(MemoryError::Unauthenticated(message))
            }
        }
    }

    async fn revoke(&self, token: &str) -> Result<bool, MemoryError> {
        let result = sqlx::query("UPDATE auth_tokens SET enabled = FALSE WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn enable(&self, token: &str) -> Result<bool, MemoryError> {
        let result = sqlx::query("UPDATE auth_tokens SET enabled = TRUE WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, token: &str) -> Result<bool, MemoryError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, user_id: Option<&str>) -> Result<Vec<AuthToken>, MemoryError> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query(&format!(
                    "SELECT {} FROM auth_tokens WHERE user_id = $1 ORDER BY created_at DESC",
                    TOKEN_COLUMNS
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM auth_tokens ORDER BY created_at DESC",
                    TOKEN_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(store_err)?;

        rows.iter().map(Self::row_to_token).collect()
    }

    async fn audit(&self, since: DateTime<Utc>) -> Result<Vec<AuditEvent>, MemoryError> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, user_id, token, action, error_message, client_info
            FROM auth_audit
            WHERE timestamp >= $1
            ORDER BY timestamp DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            let action_str: String = row.try_get("action").map_err(store_err)?;
            let action = AuditAction::parse(&action_str).ok_or_else(|| {
                MemoryError::Internal(format!("unknown audit action: {}", action_str))
            })?;
            events.push(AuditEvent {
                timestamp: row.try_get("timestamp").map_err(store_err)?,
                user_id: row.try_get("user_id").map_err(store_err)?,
                token: row.try_get("token").map_err(store_err)?,
                action,
                error_message: row.try_get("error_message").map_err(store_err)?,
                client_info: row.try_get("client_info").map_err(store_err)?,
            });
        }
        Ok(events)
    }

    async fn stats(&self, user_id: &str) -> Result<TokenStats, MemoryError> {
        let (total, active): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE enabled AND (expires_at IS NULL OR expires_at > NOW()))
            FROM auth_tokens WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        let (successes, failures): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE action = 'success'),
                   COUNT(*) FILTER (WHERE action <> 'success')
            FROM auth_audit WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        let last_used_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT MAX(last_used_at) FROM auth_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(TokenStats {
            user_id: user_id.to_string(),
            total_tokens: total as u64,
            active_tokens: active as u64,
            successful_auths: successes as u64,
            failed_auths: failures as u64,
            last_used_at,
        })
    }
}
