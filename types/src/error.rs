//! Error taxonomy shared across the workspace
//!
//! Every fallible operation in engram returns one of these kinds.
//! Inner layers never speak HTTP; only the axum boundary converts a
//! `MemoryError` into a status code and `{detail, code}` envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Malformed request (surfaced as 400)
    #[error("{0}")]
    BadInput(String),

    /// Missing/invalid/expired/disabled token, or user mismatch (401)
    #[error("{0}")]
    Unauthenticated(String),

    /// Token valid but the target resource belongs to a different owner (403)
    #[error("{0}")]
    AccessDenied(String),

    /// Resource genuinely absent for this owner (404)
    #[error("{0}")]
    NotFound(String),

    /// LLM or embedder failed or timed out
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Vector or graph store unreachable
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Graph projection exhausted its retry budget (logged, never
    /// surfaced to the synchronous request)
    #[error("graph projection failed: {0}")]
    ProjectionFailed(String),

    /// Anything else (500)
    #[error("internal error: {0}")]
    Internal(String),
}

impl MemoryError {
    /// Stable machine code for the error envelope
    pub fn code(&self) -> &'static str {
        match self {
            MemoryError::BadInput(_) => "bad_input",
            MemoryError::Unauthenticated(_) => "unauthenticated",
            MemoryError::AccessDenied(_) => "access_denied",
            MemoryError::NotFound(_) => "not_found",
            MemoryError::ProviderUnavailable(_) => "provider_unavailable",
            MemoryError::StoreUnavailable(_) => "store_unavailable",
            MemoryError::ProjectionFailed(_) => "projection_failed",
            MemoryError::Internal(_) => "internal",
        }
    }

    /// Ownership failure for a memory id, worded so the caller can tell
    /// it apart from a bad token without learning anything about rows
    /// outside their scope.
    pub fn denied_for(memory_id: &str, user_id: &str) -> Self {
        MemoryError::AccessDenied(format!(
            "Access denied: Memory {} does not belong to user {}",
            memory_id, user_id
        ))
    }
}

/// JSON error envelope returned by every HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    pub code: String,
}

impl From<&MemoryError> for ErrorBody {
    fn from(err: &MemoryError) -> Self {
        ErrorBody {
            detail: err.to_string(),
            code: err.code().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(MemoryError::BadInput("x".into()).code(), "bad_input");
        assert_eq!(
            MemoryError::AccessDenied("x".into()).code(),
            "access_denied"
        );
        assert_eq!(
            MemoryError::ProjectionFailed("x".into()).code(),
            "projection_failed"
        );
    }

    #[test]
    fn denied_for_names_the_memory_and_the_caller() {
        let err = MemoryError::denied_for("mem-1", "bob");
        assert_eq!(
            err.to_string(),
            "Access denied: Memory mem-1 does not belong to user bob"
        );
    }
}
