//! HTTP handlers for the service facade.
//!
//! Handlers marshal between wire JSON and the bridge engine; every failure
//! surfaces as a structured body with a stable error code.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth;
use crate::error::BridgeError;
use crate::protocol::{AnpRequest, AnpResponse, McpResponse};
use crate::state::AppState;

const SERVICE_NAME: &str = "anp-mcp-bridge";

// ---------------------------------------------------------------------------
// GET / — service metadata
// ---------------------------------------------------------------------------

pub async fn root() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            { "path": "/capabilities", "description": "Supported intents and methods" },
            { "path": "/register", "description": "Register a DID → OAuth token mapping" },
            { "path": "/anp-to-mcp", "description": "Translate an ANP request into an MCP call" },
            { "path": "/mcp-to-anp", "description": "Translate an MCP response into an ANP response" },
            { "path": "/sessions/{request_id}", "description": "Inspect or clear a session" },
        ]
    }))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "open_sessions": state.bridge.sessions().len().await,
        "registered_identities": state.bridge.registry().len().await,
    }))
}

// ---------------------------------------------------------------------------
// GET /capabilities
// ---------------------------------------------------------------------------

pub async fn capabilities(State(state): State<AppState>) -> Json<Value> {
    let intents: Vec<Value> = state
        .bridge
        .intents()
        .listing()
        .into_iter()
        .map(|(intent, method)| json!({ "intent": intent, "method": method }))
        .collect();

    Json(json!({
        "protocol": "anp-mcp-bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": {
            "anp_to_mcp": true,
            "mcp_to_anp": true,
            "did_oauth_mapping": true,
            "session_management": true,
        },
        "intents": intents,
    }))
}

// ---------------------------------------------------------------------------
// POST /register?did=&oauth_token=
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterParams {
    pub did: String,
    pub oauth_token: String,
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RegisterParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Err(status) = auth::authorize_admin(&state, &headers) {
        return Err((status, Json(json!({ "error": "unauthorized" }))));
    }
    if params.did.is_empty() || params.oauth_token.is_empty() {
        let err = BridgeError::InvalidParameters("'did' and 'oauth_token' must be non-empty".into());
        return Err(error_body(&err, None));
    }

    let replaced = state.bridge.registry().register(&params.did, &params.oauth_token).await;
    Ok(Json(json!({
        "success": true,
        "replaced": replaced,
        "message": format!("registered DID: {}", params.did),
    })))
}

// ---------------------------------------------------------------------------
// POST /anp-to-mcp
// ---------------------------------------------------------------------------

pub async fn anp_to_mcp(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let request: AnpRequest = serde_json::from_value(body).map_err(|e| {
        let err = BridgeError::InvalidParameters(format!("malformed ANP request: {e}"));
        error_body(&err, None)
    })?;
    let supplied_id = request.request_id.clone();

    // Forward leg through the transport adapter when a downstream is
    // configured; otherwise hand the translated envelope back to the caller
    // and leave the session open for /mcp-to-anp.
    match &state.transport {
        Some(transport) => {
            let anp = state
                .bridge
                .forward(transport.as_ref(), request, state.config.transport_timeout)
                .await;
            let status = anp_status(&anp);
            let body = Json(serde_json::to_value(&anp).unwrap_or_default());
            if status == StatusCode::OK { Ok(body) } else { Err((status, body)) }
        }
        None => {
            let mcp = state
                .bridge
                .translate_anp_to_mcp(request)
                .await
                .map_err(|e| error_body(&e, supplied_id.as_deref()))?;
            Ok(Json(json!({
                "success": true,
                "request_id": mcp.id,
                "mcp_request": mcp,
            })))
        }
    }
}

// ---------------------------------------------------------------------------
// POST /mcp-to-anp
// ---------------------------------------------------------------------------

pub async fn mcp_to_anp(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<AnpResponse>, (StatusCode, Json<Value>)> {
    let response = McpResponse::from_value(body).map_err(|e| error_body(&e, None))?;
    let id = response.id.clone();

    let anp = state
        .bridge
        .translate_mcp_to_anp(response)
        .await
        .map_err(|e| error_body(&e, Some(&id)))?;
    Ok(Json(anp))
}

// ---------------------------------------------------------------------------
// GET /sessions/{request_id}
// ---------------------------------------------------------------------------

pub async fn get_session(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let session = state
        .bridge
        .sessions()
        .lookup(&request_id)
        .await
        .map_err(|e| error_body(&e, Some(&request_id)))?;
    Ok(Json(json!({ "success": true, "session": session })))
}

// ---------------------------------------------------------------------------
// DELETE /sessions/{request_id}
// ---------------------------------------------------------------------------

pub async fn delete_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Err(status) = auth::authorize_admin(&state, &headers) {
        return Err((status, Json(json!({ "error": "unauthorized" }))));
    }

    match state.bridge.sessions().delete(&request_id).await {
        Some(_) => Ok(Json(json!({
            "success": true,
            "message": format!("cleared session: {request_id}"),
        }))),
        None => {
            let err = BridgeError::UnknownSession(request_id.clone());
            Err(error_body(&err, Some(&request_id)))
        }
    }
}

// ---------------------------------------------------------------------------
// Error shaping
// ---------------------------------------------------------------------------

/// Shape a `BridgeError` as the structured ANP error body with its HTTP
/// status. When the request id is known, the full tagged ANP response shape
/// is used; otherwise just the error object.
fn error_body(err: &BridgeError, request_id: Option<&str>) -> (StatusCode, Json<Value>) {
    let body = match request_id {
        Some(id) if !id.is_empty() => {
            serde_json::to_value(AnpResponse::failure(id, err)).unwrap_or_default()
        }
        _ => json!({ "error": { "code": err.code(), "message": err.to_string() } }),
    };
    (err.status(), Json(body))
}

/// HTTP status for an already-shaped ANP response from the forward leg.
fn anp_status(anp: &AnpResponse) -> StatusCode {
    match anp {
        AnpResponse::Success { .. } => StatusCode::OK,
        AnpResponse::Error { error, .. } => match error.code.as_str() {
            "session_timeout" => StatusCode::GATEWAY_TIMEOUT,
            "transport_failure" => StatusCode::BAD_GATEWAY,
            "unknown_session" => StatusCode::NOT_FOUND,
            // Downstream JSON-RPC errors (numeric codes) still had a routable
            // session, so the translation itself succeeded.
            code if code.parse::<i64>().is_ok() => StatusCode::OK,
            _ => StatusCode::BAD_REQUEST,
        },
    }
}
