//! HTTP client for the Memory Service
//!
//! The gateway's only path to stored memories. Error envelopes coming
//! back over the wire are mapped onto the shared taxonomy so tool
//! handlers can treat remote failures like local ones.

use anyhow::Context;
use engram_types::{
    error::ErrorBody, AddMemoriesRequest, AddMemoriesResponse, CreateComponentRequest,
    CreateDecisionRequest, CreateDecisionResponse, DecisionRationale, DeleteMemoryResponse,
    HistoryEvent, ImpactAnalysis, IntelligenceReport, LinkComponentsRequest,
    LinkMemoriesRequest, LinkMemoriesResponse, ListMemoriesResponse, MemoryError, RelatedMemory,
    SearchRequest, SearchResponse,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub struct MemoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl MemoryClient {
    /// `request_timeout` bounds each dispatch (180 s per chunk by
    /// default); `connect_timeout` bounds connection establishment.
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, MemoryError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "dispatching to memory service");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MemoryError::StoreUnavailable(format!("memory service timed out: {}", e))
            } else {
                MemoryError::StoreUnavailable(format!("memory service unreachable: {}", e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| MemoryError::Internal(format!("malformed service response: {}", e)));
        }

        let envelope = response.json::<ErrorBody>().await.unwrap_or(ErrorBody {
            detail: format!("memory service returned {}", status),
            code: "internal".to_string(),
        });
        Err(remote_error(status, envelope))
    }

    pub async fn add_memories(
        &self,
        request: &AddMemoriesRequest,
    ) -> Result<AddMemoriesResponse, MemoryError> {
        self.send(Method::POST, "/memories", Some(request)).await
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, MemoryError> {
        self.send(Method::POST, "/search", Some(request)).await
    }

    pub async fn list_memories(&self, user_id: &str) -> Result<ListMemoriesResponse, MemoryError> {
        self.send::<(), _>(
            Method::GET,
            &format!("/memories?user_id={}", urlencode(user_id)),
            None,
        )
        .await
    }

    pub async fn delete_memory(
        &self,
        memory_id: &str,
        user_id: &str,
    ) -> Result<DeleteMemoryResponse, MemoryError> {
        self.send::<(), _>(
            Method::DELETE,
            &format!(
                "/memories/{}?user_id={}",
                urlencode(memory_id),
                urlencode(user_id)
            ),
            None,
        )
        .await
    }

    pub async fn memory_history(
        &self,
        memory_id: &str,
        user_id: &str,
    ) -> Result<Vec<HistoryEvent>, MemoryError> {
        self.send::<(), _>(
            Method::GET,
            &format!(
                "/memories/{}/history?user_id={}",
                urlencode(memory_id),
                urlencode(user_id)
            ),
            None,
        )
        .await
    }

    pub async fn link_memories(
        &self,
        request: &LinkMemoriesRequest,
    ) -> Result<LinkMemoriesResponse, MemoryError> {
        self.send(Method::POST, "/graph/link", Some(request)).await
    }

    pub async fn related_memories(
        &self,
        memory_id: &str,
        user_id: &str,
        depth: Option<u32>,
    ) -> Result<Vec<RelatedMemory>, MemoryError> {
        let mut path = format!(
            "/graph/related/{}?user_id={}",
            urlencode(memory_id),
            urlencode(user_id)
        );
        if let Some(depth) = depth {
            path.push_str(&format!("&depth={}", depth));
        }
        self.send::<(), _>(Method::GET, &path, None).await
    }

    pub async fn intelligence(&self, user_id: &str) -> Result<IntelligenceReport, MemoryError> {
        self.send::<(), _>(
            Method::GET,
            &format!("/graph/intelligence?user_id={}", urlencode(user_id)),
            None,
        )
        .await
    }

    pub async fn create_component(
        &self,
        request: &CreateComponentRequest,
    ) -> Result<serde_json::Value, MemoryError> {
        self.send(Method::POST, "/graph/components", Some(request))
            .await
    }

    pub async fn link_components(
        &self,
        request: &LinkComponentsRequest,
    ) -> Result<serde_json::Value, MemoryError> {
        self.send(Method::POST, "/graph/components/link", Some(request))
            .await
    }

    pub async fn component_impact(&self, name: &str) -> Result<ImpactAnalysis, MemoryError> {
        self.send::<(), _>(
            Method::GET,
            &format!("/graph/components/{}/impact", urlencode(name)),
            None,
        )
        .await
    }

    pub async fn create_decision(
        &self,
        request: &CreateDecisionRequest,
    ) -> Result<CreateDecisionResponse, MemoryError> {
        self.send(Method::POST, "/graph/decisions", Some(request))
            .await
    }

    pub async fn decision_rationale(&self, id: &str) -> Result<DecisionRationale, MemoryError> {
        self.send::<(), _>(
            Method::GET,
            &format!("/graph/decisions/{}", urlencode(id)),
            None,
        )
        .await
    }
}

/// Rebuild the typed error from the wire envelope, keyed on the stable
/// machine code with the HTTP status as fallback
fn remote_error(status: StatusCode, envelope: ErrorBody) -> MemoryError {
    match envelope.code.as_str() {
        "bad_input" => MemoryError::BadInput(envelope.detail),
        "unauthenticated" => MemoryError::Unauthenticated(envelope.detail),
        "access_denied" => MemoryError::AccessDenied(envelope.detail),
        "not_found" => MemoryError::NotFound(envelope.detail),
        "provider_unavailable" => MemoryError::ProviderUnavailable(envelope.detail),
        "store_unavailable" => MemoryError::StoreUnavailable(envelope.detail),
        _ => match status {
            StatusCode::BAD_REQUEST => MemoryError::BadInput(envelope.detail),
            StatusCode::UNAUTHORIZED => MemoryError::Unauthenticated(envelope.detail),
            StatusCode::FORBIDDEN => MemoryError::AccessDenied(envelope.detail),
            StatusCode::NOT_FOUND => MemoryError::NotFound(envelope.detail),
            _ => MemoryError::Internal(envelope.detail),
        },
    }
}

/// Percent-encode a path/query component
fn urlencode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_map_back_onto_the_taxonomy() {
        let err = remote_error(
            StatusCode::FORBIDDEN,
            ErrorBody {
                detail: "Access denied: Memory m1 does not belong to user bob".into(),
                code: "access_denied".into(),
            },
        );
        assert!(matches!(err, MemoryError::AccessDenied(_)));

        // Unknown code falls back to the status
        let err = remote_error(
            StatusCode::NOT_FOUND,
            ErrorBody {
                detail: "gone".into(),
                code: "surprise".into(),
            },
        );
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("alice@x"), "alice%40x");
        assert_eq!(urlencode("plain-id_1.2~3"), "plain-id_1.2~3");
        assert_eq!(urlencode("a b/c"), "a%20b%2Fc");
    }
}
