//! Transport adapter: delivers an MCP envelope to a downstream service.
//!
//! The bridge engine only ever sees the `McpTransport` trait — it never does
//! network I/O itself, and holds no lock across the `send` await.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{McpRequest, McpResponse};

#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Deliver the request and return the downstream response, validated
    /// against the JSON-RPC envelope contract. Transport-level failures map
    /// to `TransportFailure`.
    async fn send(&self, request: &McpRequest) -> BridgeResult<McpResponse>;
}

/// JSON-RPC 2.0 over HTTP POST.
pub struct HttpTransport {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self { client, url: url.into(), timeout }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send(&self, request: &McpRequest) -> BridgeResult<McpResponse> {
        let mut req = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(request);

        if let Some(token) = &request.oauth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let response = req.send().await.map_err(|e| {
            BridgeError::TransportFailure(format!("request to '{}' failed: {e}", self.url))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::TransportFailure(format!(
                "downstream returned HTTP {status}: {}",
                truncate_str(&body, 500)
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            BridgeError::TransportFailure(format!("downstream response is not valid JSON: {e}"))
        })?;

        McpResponse::from_value(body)
    }
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let boundary = s
            .char_indices()
            .take_while(|(i, _)| *i < max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max_len);
        format!("{}...", &s[..boundary])
    }
}
