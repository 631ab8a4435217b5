//! ANP and MCP wire types.
//!
//! Loosely-typed JSON bodies are validated at the boundary and turned into
//! tagged variants here; malformed input is rejected early with
//! `InvalidParameters` instead of surfacing as missing-field errors deep in
//! the translation logic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, BridgeResult};

pub const JSONRPC_VERSION: &str = "2.0";

// ---------------------------------------------------------------------------
// ANP
// ---------------------------------------------------------------------------

/// An inbound ANP request: identity-addressed, intent-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnpRequest {
    pub did: String,
    pub intent: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Correlation id. Generated by the bridge when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AnpRequest {
    /// Boundary validation: `did` and `intent` must be non-empty.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.did.is_empty() {
            return Err(BridgeError::InvalidParameters("'did' must not be empty".into()));
        }
        if self.intent.is_empty() {
            return Err(BridgeError::InvalidParameters("'intent' must not be empty".into()));
        }
        if let Some(id) = &self.request_id {
            if id.is_empty() {
                return Err(BridgeError::InvalidParameters(
                    "'request_id', when supplied, must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

/// ANP error payload: stable code + human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnpError {
    pub code: String,
    pub message: String,
}

/// An ANP response. Exactly one of result/error is present, selected by the
/// `status` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnpResponse {
    Success { request_id: String, result: Value },
    Error { request_id: String, error: AnpError },
}

impl AnpResponse {
    pub fn success(request_id: impl Into<String>, result: Value) -> Self {
        Self::Success { request_id: request_id.into(), result }
    }

    pub fn failure(request_id: impl Into<String>, err: &BridgeError) -> Self {
        Self::Error {
            request_id: request_id.into(),
            error: AnpError { code: err.code().to_string(), message: err.to_string() },
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            Self::Success { request_id, .. } | Self::Error { request_id, .. } => request_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ---------------------------------------------------------------------------
// MCP (JSON-RPC 2.0)
// ---------------------------------------------------------------------------

/// An outbound MCP method call. `id` equals the correlating session key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Map<String, Value>,
    pub id: String,
    /// Credential resolved from the identity registry, attached so the
    /// downstream service can authenticate the originating agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<String>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Result-or-error payload of a JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpPayload {
    Result { result: Value },
    Error { error: McpErrorObject },
}

/// A validated inbound MCP response: envelope fields plus exactly one of
/// result/error.
#[derive(Debug, Clone, Serialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: String,
    #[serde(flatten)]
    pub payload: McpPayload,
}

/// Permissive deserialization shape for an MCP response body. The JSON-RPC
/// contract (exactly one of result/error) is enforced in `TryFrom`, not by
/// serde, so violations produce a defined `InvalidParameters` error.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMcpResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<McpErrorObject>,
}

impl TryFrom<RawMcpResponse> for McpResponse {
    type Error = BridgeError;

    fn try_from(raw: RawMcpResponse) -> BridgeResult<Self> {
        let jsonrpc = raw
            .jsonrpc
            .ok_or_else(|| BridgeError::InvalidParameters("missing 'jsonrpc' field".into()))?;
        if jsonrpc != JSONRPC_VERSION {
            return Err(BridgeError::InvalidParameters(format!(
                "unsupported jsonrpc version '{jsonrpc}' (expected \"{JSONRPC_VERSION}\")"
            )));
        }
        let id = raw
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BridgeError::InvalidParameters("missing 'id' field".into()))?;

        let payload = match (raw.result, raw.error) {
            (Some(result), None) => McpPayload::Result { result },
            (None, Some(error)) => McpPayload::Error { error },
            (Some(_), Some(_)) => {
                return Err(BridgeError::InvalidParameters(
                    "response carries both 'result' and 'error'".into(),
                ))
            }
            (None, None) => {
                return Err(BridgeError::InvalidParameters(
                    "response carries neither 'result' nor 'error'".into(),
                ))
            }
        };

        Ok(McpResponse { jsonrpc, id, payload })
    }
}

impl McpResponse {
    /// Parse and validate a raw JSON body.
    pub fn from_value(body: Value) -> BridgeResult<Self> {
        let raw: RawMcpResponse = serde_json::from_value(body)
            .map_err(|e| BridgeError::InvalidParameters(format!("malformed MCP response: {e}")))?;
        raw.try_into()
    }
}
