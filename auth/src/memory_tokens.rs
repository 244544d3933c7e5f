//! In-memory token store for tests

use crate::token::generate_token;
use crate::tokens::{check_token, NewToken, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engram_types::{AuditAction, AuditEvent, AuthToken, MemoryError, TokenStats};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    tokens: HashMap<String, AuthToken>,
    audit: Vec<AuditEvent>,
}

#[derive(Default)]
pub struct InMemoryTokenStore {
    inner: RwLock<Inner>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of audit rows recorded so far (test hook)
    pub async fn audit_len(&self) -> usize {
        self.inner.read().await.audit.len()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn create_token(&self, new: NewToken) -> Result<AuthToken, MemoryError> {
        let token = AuthToken {
            token: generate_token(),
            user_id: new.user_id,
            display_name: new.display_name,
            email: new.email,
            enabled: true,
            created_at: Utc::now(),
            expires_at: new.expires_at,
            last_used_at: None,
            permissions: new.permissions,
        };
        let mut inner = self.inner.write().await;
        inner.tokens.insert(token.token.clone(), token.clone());
        Ok(token)
    }

    async fn get_token(&self, token: &str) -> Result<Option<AuthToken>, MemoryError> {
        let inner = self.inner.read().await;
        Ok(inner.tokens.get(token).cloned())
    }

    async fn validate(
        &self,
        token: &str,
        user_id_header: &str,
        client_info: Option<serde_json::Value>,
    ) -> Result<AuthToken, MemoryError> {
        let mut inner = self.inner.write().await;
        let row = inner.tokens.get(token).cloned();

        match check_token(row, user_id_header, Utc::now()) {
            Ok(valid) => {
                if let Some(stored) = inner.tokens.get_mut(token) {
                    stored.last_used_at = Some(Utc::now());
                }
                inner.audit.push(AuditEvent {
                    timestamp: Utc::now(),
                    user_id: user_id_header.to_string(),
                    token: token.to_string(),
                    action: AuditAction::Success,
                    error_message: None,
                    client_info,
                });
                Ok(valid)
            }
            Err((action, message)) => {
                inner.audit.push(AuditEvent {
                    timestamp: Utc::now(),
                    user_id: user_id_header.to_string(),
                    token: token.to_string(),
                    action,
                    error_message: Some(message.clone()),
                    client_info,
                });
                Err(MemoryError::Unauthenticated(message))
            }
        }
    }

    async fn revoke(&self, token: &str) -> Result<bool, MemoryError> {
        let mut inner = self.inner.write().await;
        match inner.tokens.get_mut(token) {
            Some(stored) => {
                stored.enabled = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn enable(&self, token: &str) -> Result<bool, MemoryError> {
        let mut inner = self.inner.write().await;
        match inner.tokens.get_mut(token) {
            Some(stored) => {
                stored.enabled = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, token: &str) -> Result<bool, MemoryError> {
        let mut inner = self.inner.write().await;
        Ok(inner.tokens.remove(token).is_some())
    }

    async fn list(&self, user_id: Option<&str>) -> Result<Vec<AuthToken>, MemoryError> {
        let inner = self.inner.read().await;
        let mut tokens: Vec<AuthToken> = inner
            .tokens
            .values()
            .filter(|t| user_id.map(|u| t.user_id == u).unwrap_or(true))
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    async fn audit(&self, since: DateTime<Utc>) -> Result<Vec<AuditEvent>, MemoryError> {
        let inner = self.inner.read().await;
        let mut events: Vec<AuditEvent> = inner
            .audit
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events)
    }

    async fn stats(&self, user_id: &str) -> Result<TokenStats, MemoryError> {
        let inner = self.inner.read().await;
        let now = Utc::now();
        let owned: Vec<&AuthToken> = inner
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .collect();
        let successes = inner
            .audit
            .iter()
            .filter(|e| e.user_id == user_id && e.action == AuditAction::Success)
            .count() as u64;
        let failures = inner
            .audit
            .iter()
            .filter(|e| e.user_id == user_id && e.action != AuditAction::Success)
            .count() as u64;

        Ok(TokenStats {
            user_id: user_id.to_string(),
            total_tokens: owned.len() as u64,
            active_tokens: owned
                .iter()
                .filter(|t| t.enabled && !t.is_expired(now))
                .count() as u64,
            successful_auths: successes,
            failed_auths: failures,
            last_used_at: owned.iter().filter_map(|t| t.last_used_at).max(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_token(user: &str) -> NewToken {
        NewToken {
            user_id: user.to_string(),
            display_name: user.to_string(),
            email: format!("{}@example.com", user),
            expires_at: None,
            permissions: vec![],
        }
    }

    #[tokio::test]
    async fn validate_success_updates_last_used_and_audits() {
        let store = InMemoryTokenStore::new();
        let issued = store.create_token(new_token("alice")).await.unwrap();

        let validated = store
            .validate(&issued.token, "alice", None)
            .await
            .unwrap();
        assert_eq!(validated.user_id, "alice");

        let stored = store.get_token(&issued.token).await.unwrap().unwrap();
        assert!(stored.last_used_at.is_some());

        let audit = store.audit(Utc::now() - Duration::minutes(1)).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, AuditAction::Success);
    }

    #[tokio::test]
    async fn garbage_token_audits_the_literal_value() {
        let store = InMemoryTokenStore::new();
        let err = store.validate("garbage", "alice@x", None).await.unwrap_err();
        assert!(matches!(err, MemoryError::Unauthenticated(_)));
        assert!(err.to_string().contains("Invalid authentication token"));

        let audit = store.audit(Utc::now() - Duration::minutes(1)).await.unwrap();
        assert_eq!(audit[0].action, AuditAction::AuthFailed);
        assert_eq!(audit[0].token, "garbage");
    }

    #[tokio::test]
    async fn expired_token_is_audited_as_expired() {
        let store = InMemoryTokenStore::new();
        let mut new = new_token("alice");
        new.expires_at = Some(Utc::now() - Duration::hours(1));
        let issued = store.create_token(new).await.unwrap();

        let err = store
            .validate(&issued.token, "alice", None)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Unauthenticated(_)));

        let audit = store.audit(Utc::now() - Duration::minutes(1)).await.unwrap();
        assert_eq!(audit[0].action, AuditAction::Expired);
    }

    #[tokio::test]
    async fn revoke_and_enable_flip_validation() {
        let store = InMemoryTokenStore::new();
        let issued = store.create_token(new_token("alice")).await.unwrap();

        assert!(store.revoke(&issued.token).await.unwrap());
        let err = store
            .validate(&issued.token, "alice", None)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Unauthenticated(_)));

        assert!(store.enable(&issued.token).await.unwrap());
        assert!(store.validate(&issued.token, "alice", None).await.is_ok());

        assert!(!store.revoke("missing").await.unwrap());
    }

    #[tokio::test]
    async fn user_mismatch_is_denied() {
        let store = InMemoryTokenStore::new();
        let issued = store.create_token(new_token("alice")).await.unwrap();

        let err = store
            .validate(&issued.token, "bob", None)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Unauthenticated(_)));

        let audit = store.audit(Utc::now() - Duration::minutes(1)).await.unwrap();
        assert_eq!(audit[0].action, AuditAction::Denied);
    }

    #[tokio::test]
    async fn stats_count_tokens_and_outcomes() {
        let store = InMemoryTokenStore::new();
        let issued = store.create_token(new_token("alice")).await.unwrap();
        store.create_token(new_token("alice")).await.unwrap();
        store.create_token(new_token("bob")).await.unwrap();

        store.validate(&issued.token, "alice", None).await.unwrap();
        let _ = store.validate("garbage", "alice", None).await;

        let stats = store.stats("alice").await.unwrap();
        assert_eq!(stats.total_tokens, 2);
        assert_eq!(stats.active_tokens, 2);
        assert_eq!(stats.successful_auths, 1);
        assert_eq!(stats.failed_auths, 1);
    }
}
