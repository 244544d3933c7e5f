//! Auth token and audit record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An issued API token. The `token` value itself is opaque: a stable
/// `egm_` prefix followed by 64 hex characters (256 bits of entropy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    /// Capability tags, e.g. "admin"
    pub permissions: Vec<String>,
}

impl AuthToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Outcome recorded for one authentication attempt or token mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Success,
    AuthFailed,
    Revoked,
    Expired,
    Denied,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Success => "success",
            AuditAction::AuthFailed => "auth_failed",
            AuditAction::Revoked => "revoked",
            AuditAction::Expired => "expired",
            AuditAction::Denied => "denied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(AuditAction::Success),
            "auth_failed" => Some(AuditAction::AuthFailed),
            "revoked" => Some(AuditAction::Revoked),
            "expired" => Some(AuditAction::Expired),
            "denied" => Some(AuditAction::Denied),
            _ => None,
        }
    }
}

/// Append-only audit row. The literal token presented by the caller is
/// recorded even when it does not match any issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub token: String,
    pub action: AuditAction,
    pub error_message: Option<String>,
    pub client_info: Option<serde_json::Value>,
}

/// Per-user usage summary served by `stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStats {
    pub user_id: String,
    pub total_tokens: u64,
    pub active_tokens: u64,
    pub successful_auths: u64,
    pub failed_auths: u64,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_at: Option<DateTime<Utc>>) -> AuthToken {
        AuthToken {
            token: "egm_test".into(),
            user_id: "alice".into(),
            display_name: "Alice".into(),
            email: "alice@example.com".into(),
            enabled: true,
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
            permissions: vec!["admin".into()],
        }
    }

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let now = Utc::now();
        assert!(!token(None).is_expired(now));
        assert!(!token(Some(now + Duration::hours(1))).is_expired(now));
        assert!(token(Some(now)).is_expired(now));
        assert!(token(Some(now - Duration::seconds(1))).is_expired(now));
    }

    #[test]
    fn permission_lookup() {
        let t = token(None);
        assert!(t.has_permission("admin"));
        assert!(!t.has_permission("write"));
    }
}
