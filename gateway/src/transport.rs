//! Dual MCP transports
//!
//! HTTP-stream at `/mcp/` (POST carries one JSON-RPC message and the
//! response comes back in the HTTP body) and SSE compatibility at
//! `/sse/` (GET opens the event stream and announces the message
//! endpoint; POSTed messages are answered on the stream). Both
//! validate the `X-MCP-Token`/`X-MCP-UserID` headers on every request.

use crate::protocol::{
    initialize_result, tool_error, tool_result, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR,
    INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::tools::{execute_tool, tool_descriptors};
use crate::{project, GatewayState};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use engram_types::{error::ErrorBody, MemoryError};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SSE_CHANNEL_CAPACITY: usize = 64;

/// Identity attached to a request after header validation
pub struct RequestScope {
    pub user_id: String,
    pub project_id: String,
}

/// Validate the required headers against the auth store and derive the
/// effective project scope
pub async fn authenticate(
    state: &GatewayState,
    headers: &HeaderMap,
    transport: &str,
) -> Result<RequestScope, MemoryError> {
    let token = headers
        .get("X-MCP-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| MemoryError::Unauthenticated("Missing X-MCP-Token header".into()))?;
    let user_id = headers
        .get("X-MCP-UserID")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| MemoryError::Unauthenticated("Missing X-MCP-UserID header".into()))?;

    let client_info = json!({ "transport": transport });
    state
        .auth
        .validate(token, user_id, Some(client_info))
        .await?;

    let project_path = headers
        .get("X-MCP-ProjectPath")
        .and_then(|v| v.to_str().ok());
    let project_id = project::derive_project_id(
        state.project_id_mode,
        project_path,
        &state.default_user_id,
    );

    Ok(RequestScope {
        user_id: user_id.to_string(),
        project_id,
    })
}

fn unauthorized(err: MemoryError) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody::from(&err)),
    )
        .into_response()
}

/// Process one JSON-RPC message. Notifications yield `None`.
pub async fn handle_message(
    state: &GatewayState,
    scope: &RequestScope,
    raw: &[u8],
) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_slice(raw) {
        Ok(request) => request,
        Err(e) => {
            return Some(JsonRpcResponse::failure(
                Value::Null,
                PARSE_ERROR,
                format!("parse error: {}", e),
            ))
        }
    };

    if request.is_notification() {
        debug!(method = %request.method, "notification received");
        return None;
    }
    let id = request.id.clone().unwrap_or(Value::Null);

    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(id, initialize_result()),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => {
            JsonRpcResponse::success(id, json!({ "tools": tool_descriptors() }))
        }
        "tools/call" => {
            let params = request.params.unwrap_or(Value::Null);
            let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
                return Some(JsonRpcResponse::failure(
                    id,
                    INVALID_PARAMS,
                    "tools/call requires a tool name",
                ));
            };
            let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

            info!(tool = name, project = %scope.project_id, "tool call");
            match execute_tool(state, &scope.project_id, name, &arguments).await {
                Ok(value) => JsonRpcResponse::success(id, tool_result(&value)),
                Err(MemoryError::Internal(message)) => {
                    JsonRpcResponse::failure(id, INTERNAL_ERROR, message)
                }
                // Domain failures stay inside the tool result so the
                // model can read them.
                Err(e) => JsonRpcResponse::success(id, tool_error(&e.to_string())),
            }
        }
        other => JsonRpcResponse::failure(
            id,
            METHOD_NOT_FOUND,
            format!("unknown method: {}", other),
        ),
    };
    Some(response)
}

// ---- HTTP-stream transport (/mcp/) ----

pub async fn mcp_post(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let scope = match authenticate(&state, &headers, "http-stream").await {
        Ok(scope) => scope,
        Err(e) => return unauthorized(e),
    };

    match handle_message(&state, &scope, &body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// GET on the stream endpoint: a keep-alive event stream. The gateway
/// sends no server-initiated messages, so the stream only carries
/// heartbeats.
pub async fn mcp_get(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Response {
    if let Err(e) = authenticate(&state, &headers, "http-stream").await {
        return unauthorized(e);
    }

    let stream = tokio_stream::pending::<Result<Event, Infallible>>();
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}

// ---- SSE transport (/sse/) ----

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

/// Open an SSE session. The first event names the endpoint to POST
/// messages to; responses arrive as `message` events.
pub async fn sse_get(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Response {
    if let Err(e) = authenticate(&state, &headers, "sse").await {
        return unauthorized(e);
    }

    let session_id = Uuid::new_v4().to_string();
    let (sender, receiver) = mpsc::channel::<String>(SSE_CHANNEL_CAPACITY);
    state.sessions.write().await.insert(session_id.clone(), sender);
    info!(session_id = %session_id, "sse session opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/sse/?session_id={}", session_id));
    let messages = ReceiverStream::new(receiver)
        .map(|payload| Event::default().event("message").data(payload));

    let stream: std::pin::Pin<
        Box<dyn Stream<Item = Result<Event, Infallible>> + Send>,
    > = Box::pin(
        tokio_stream::once(endpoint)
            .chain(messages)
            .map(Ok::<Event, Infallible>),
    );

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}

/// Accept one JSON-RPC message for an open SSE session. The response
/// is delivered on the session's event stream.
pub async fn sse_post(
    State(state): State<GatewayState>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let scope = match authenticate(&state, &headers, "sse").await {
        Ok(scope) => scope,
        Err(e) => return unauthorized(e),
    };

    let Some(session_id) = query.session_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                detail: "session_id query parameter is required".into(),
                code: "bad_input".into(),
            }),
        )
            .into_response();
    };

    let sender = state.sessions.read().await.get(&session_id).cloned();
    let Some(sender) = sender else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                detail: format!("no open session {}", session_id),
                code: "not_found".into(),
            }),
        )
            .into_response();
    };

    if let Some(response) = handle_message(&state, &scope, &body).await {
        let payload = match serde_json::to_string(&response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize sse response: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        if sender.send(payload).await.is_err() {
            // Client went away; drop the session
            state.sessions.write().await.remove(&session_id);
            return StatusCode::GONE.into_response();
        }
    }

    StatusCode::ACCEPTED.into_response()
}
