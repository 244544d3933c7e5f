//! Validation-side token cache
//!
//! Caches token lookups for at most 60 seconds to keep per-request
//! validation off the database hot path. Audit rows and `last_used_at`
//! updates still go through the store on every call; only the row
//! lookup is cached. In-process revocations invalidate their entry
//! immediately; out-of-process revocations become visible when the
//! entry expires, inside the allowed window.

use crate::tokens::{check_token, NewToken, TokenStore};
use chrono::{DateTime, Utc};
use engram_types::{AuditEvent, AuthToken, MemoryError, TokenStats};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

const CACHE_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    token: AuthToken,
    cached_at: Instant,
}

pub struct CachedValidator {
    store: Arc<dyn TokenStore>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl CachedValidator {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            ttl: CACHE_TTL,
        }
    }

    #[cfg(test)]
    fn with_ttl(store: Arc<dyn TokenStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Validate with the cached row when fresh. The enabled/expiry/
    /// user checks always run; a cache hit only skips the lookup.
    /// Failures always consult the store so the audit row is written
    /// there.
    pub async fn validate(
        &self,
        token: &str,
        user_id_header: &str,
        client_info: Option<serde_json::Value>,
    ) -> Result<AuthToken, MemoryError> {
        let cached = {
            let cache = self.cache.read().await;
            cache
                .get(token)
                .filter(|entry| entry.cached_at.elapsed() < self.ttl)
                .map(|entry| entry.token.clone())
        };

        if let Some(row) = cached {
            if check_token(Some(row.clone()), user_id_header, Utc::now()).is_ok() {
                debug!("token validated from cache");
                // Still record the success and touch last_used_at
                return self.store.validate(token, user_id_header, client_info).await;
            }
            // Cached row no longer passes; drop it and fall through to
            // the store for the authoritative answer and audit row.
            self.cache.write().await.remove(token);
        }

        let result = self.store.validate(token, user_id_header, client_info).await;
        if let Ok(valid) = &result {
            self.cache.write().await.insert(
                token.to_string(),
                CacheEntry {
                    token: valid.clone(),
                    cached_at: Instant::now(),
                },
            );
        }
        result
    }

    async fn invalidate(&self, token: &str) {
        self.cache.write().await.remove(token);
    }

    // Write operations pass through and invalidate the cached entry so
    // revocations are visible immediately in this process.

    pub async fn create_token(&self, new: NewToken) -> Result<AuthToken, MemoryError> {
        self.store.create_token(new).await
    }

    pub async fn revoke(&self, token: &str) -> Result<bool, MemoryError> {
        self.invalidate(token).await;
        self.store.revoke(token).await
    }

    pub async fn enable(&self, token: &str) -> Result<bool, MemoryError> {
        self.invalidate(token).await;
        self.store.enable(token).await
    }

    pub async fn delete(&self, token: &str) -> Result<bool, MemoryError> {
        self.invalidate(token).await;
        self.store.delete(token).await
    }

    pub async fn list(&self, user_id: Option<&str>) -> Result<Vec<AuthToken>, MemoryError> {
        self.store.list(user_id).await
    }

    pub async fn audit(&self, since: DateTime<Utc>) -> Result<Vec<AuditEvent>, MemoryError> {
        self.store.audit(since).await
    }

    pub async fn stats(&self, user_id: &str) -> Result<TokenStats, MemoryError> {
        self.store.stats(user_id).await
    }

    /// Validate a token and require a capability tag; used by
    /// administrative endpoints.
    pub async fn require_permission(
        &self,
        token: &str,
        user_id_header: &str,
        permission: &str,
    ) -> Result<AuthToken, MemoryError> {
        let validated = self.validate(token, user_id_header, None).await?;
        if !validated.has_permission(permission) {
            return Err(MemoryError::Unauthenticated(format!(
                "Token lacks the {} permission",
                permission
            )));
        }
        Ok(validated)
    }
}
