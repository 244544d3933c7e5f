//! Token store trait and validation semantics

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engram_types::{AuditAction, AuditEvent, AuthToken, MemoryError, TokenStats};

/// Parameters for issuing a token
#[derive(Debug, Clone)]
pub struct NewToken {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub permissions: Vec<String>,
}

/// The auth store contract. All write operations are transactional per
/// token; audit appends are durable before `validate` returns.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Issue a new token and return it (the only time the value is
    /// shown)
    async fn create_token(&self, new: NewToken) -> Result<AuthToken, MemoryError>;

    /// Look up a token row without side effects
    async fn get_token(&self, token: &str) -> Result<Option<AuthToken>, MemoryError>;

    /// Validate `token` against the user id presented in the request
    /// headers. Success updates `last_used_at` and writes a `success`
    /// audit row; every failure writes a typed failure row. The audit
    /// write completes before the result is returned.
    async fn validate(
        &self,
        token: &str,
        user_id_header: &str,
        client_info: Option<serde_json::Value>,
    ) -> Result<AuthToken, MemoryError>;

    async fn revoke(&self, token: &str) -> Result<bool, MemoryError>;

    async fn enable(&self, token: &str) -> Result<bool, MemoryError>;

    async fn delete(&self, token: &str) -> Result<bool, MemoryError>;

    /// All tokens, optionally narrowed to one user
    async fn list(&self, user_id: Option<&str>) -> Result<Vec<AuthToken>, MemoryError>;

    /// Audit events since `since`, newest first
    async fn audit(&self, since: DateTime<Utc>) -> Result<Vec<AuditEvent>, MemoryError>;

    /// Usage summary for one user
    async fn stats(&self, user_id: &str) -> Result<TokenStats, MemoryError>;
}

/// Evaluate the validation truth table against a looked-up row.
/// Returns the typed failure to audit and surface, or the row when
/// everything checks out.
pub(crate) fn check_token(
    row: Option<AuthToken>,
    user_id_header: &str,
    now: DateTime<Utc>,
) -> Result<AuthToken, (AuditAction, String)> {
    let token = match row {
        Some(token) => token,
        None => {
            return Err((
                AuditAction::AuthFailed,
                "Invalid authentication token".to_string(),
            ))
        }
    };

    if !token.enabled {
        return Err((
            AuditAction::Revoked,
            "Authentication token has been revoked".to_string(),
        ));
    }
    if token.is_expired(now) {
        return Err((
            AuditAction::Expired,
            "Authentication token has expired".to_string(),
        ));
    }
    if token.user_id != user_id_header {
        return Err((
            AuditAction::Denied,
            format!("Token is not bound to user {}", user_id_header),
        ));
    }

    Ok(token)
}
