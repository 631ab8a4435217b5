//! Built-in self-test and demonstration client.
//!
//! Neither is part of the translation core — they exercise it. The self-test
//! drives an in-process engine; the demo client talks HTTP to a running
//! bridge.

use anyhow::{anyhow, Context};
use serde_json::{json, Value};

use crate::protocol::{AnpRequest, AnpResponse, McpResponse};
use crate::state::AppState;

/// Exercise register → anp-to-mcp → mcp-to-anp against the in-process
/// engine, mirroring the flow a real caller would take.
pub async fn run(state: &AppState) -> anyhow::Result<()> {
    tracing::info!("self-test: starting");

    let did = "test_self_001";
    let token = "oauth_self_001";
    state.bridge.registry().register(did, token).await;
    state.bridge.registry().authorize(did).await?;
    tracing::info!(did, "self-test: identity registered and authorized");

    let request: AnpRequest = serde_json::from_value(json!({
        "did": did,
        "intent": "查询用户信息",
        "parameters": { "user_id": "12345", "fields": ["name", "age"] }
    }))?;

    let mcp = state.bridge.translate_anp_to_mcp(request).await?;
    anyhow::ensure!(mcp.method == "getUserInfo", "unexpected method: {}", mcp.method);
    anyhow::ensure!(mcp.params["userId"] == "12345", "user_id was not renamed");
    tracing::info!(
        id = %mcp.id,
        envelope = %serde_json::to_string(&mcp)?,
        "self-test: anp→mcp ok"
    );

    let response = McpResponse::from_value(json!({
        "jsonrpc": "2.0",
        "result": { "name": "张三", "age": 30 },
        "id": mcp.id
    }))?;

    let anp = state.bridge.translate_mcp_to_anp(response).await?;
    match &anp {
        AnpResponse::Success { request_id, result } => {
            anyhow::ensure!(request_id == &mcp.id, "round trip changed the request id");
            anyhow::ensure!(result["name"] == "张三", "result was altered in translation");
        }
        AnpResponse::Error { error, .. } => {
            return Err(anyhow!("round trip produced an error: {}", error.message));
        }
    }
    anyhow::ensure!(
        state.bridge.sessions().is_empty().await,
        "session was not retired after completion"
    );

    tracing::info!("self-test: all checks passed");
    Ok(())
}

/// Drive a running bridge over HTTP: register a DID, translate a request,
/// feed back a synthetic MCP response.
pub async fn run_demo_client(base_url: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let did = "test_client_001";

    tracing::info!(base_url, "demo client: starting");

    let register: Value = client
        .post(format!("{base_url}/register"))
        .query(&[("did", did), ("oauth_token", "oauth_token_client_001")])
        .send()
        .await
        .context("is the bridge running?")?
        .json()
        .await?;
    tracing::info!(response = %register, "demo client: registered");

    let anp_request = json!({
        "did": did,
        "intent": "查询用户信息",
        "parameters": { "user_id": "U12345", "fields": ["name", "email", "phone"] }
    });
    let translated: Value = client
        .post(format!("{base_url}/anp-to-mcp"))
        .json(&anp_request)
        .send()
        .await?
        .json()
        .await?;
    tracing::info!(response = %translated, "demo client: anp→mcp");

    let request_id = translated["request_id"]
        .as_str()
        .ok_or_else(|| anyhow!("no request_id in translation response"))?;

    // Simulate the downstream MCP service answering.
    let mcp_response = json!({
        "jsonrpc": "2.0",
        "result": {
            "name": "李明",
            "email": "liming@example.com",
            "phone": "13800138000"
        },
        "id": request_id
    });
    let anp_response: Value = client
        .post(format!("{base_url}/mcp-to-anp"))
        .json(&mcp_response)
        .send()
        .await?
        .json()
        .await?;
    tracing::info!(response = %anp_response, "demo client: mcp→anp");

    anyhow::ensure!(anp_response["status"] == "success", "round trip did not succeed");
    tracing::info!("demo client: done");
    Ok(())
}
