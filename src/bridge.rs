//! Bridge engine: the ANP⇄MCP translation core.
//!
//! Forward leg: authorize the identity, translate intent and parameters,
//! open a session, emit the JSON-RPC envelope. Return leg: atomically retire
//! the session and shape the ANP response. The engine addresses sessions
//! only by key through the tracker and holds nothing across the transport
//! await.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{BridgeError, BridgeResult};
use crate::intent::IntentMap;
use crate::protocol::{
    AnpRequest, AnpResponse, McpPayload, McpRequest, McpResponse, JSONRPC_VERSION,
};
use crate::registry::IdentityRegistry;
use crate::session::SessionTracker;
use crate::transport::McpTransport;

/// Bounded retries for generated-id collisions before giving up.
const ID_GENERATION_ATTEMPTS: usize = 8;

pub struct BridgeEngine {
    registry: Arc<IdentityRegistry>,
    intents: Arc<IntentMap>,
    sessions: Arc<SessionTracker>,
}

impl BridgeEngine {
    pub fn new(
        registry: Arc<IdentityRegistry>,
        intents: Arc<IntentMap>,
        sessions: Arc<SessionTracker>,
    ) -> Self {
        Self { registry, intents, sessions }
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn intents(&self) -> &IntentMap {
        &self.intents
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Shared handle to the tracker, for the background sweep.
    pub fn sessions_arc(&self) -> Arc<SessionTracker> {
        Arc::clone(&self.sessions)
    }

    /// Translate an ANP request into an outbound MCP call, opening exactly
    /// one session on success and none on any failure path.
    pub async fn translate_anp_to_mcp(&self, request: AnpRequest) -> BridgeResult<McpRequest> {
        request.validate()?;

        let credential = self.registry.authorize(&request.did).await?;
        let mapping = self.intents.resolve(&request.intent)?;
        let params = mapping.apply(&request.parameters)?;
        let method = mapping.method.clone();
        let did = request.did.clone();

        // Only now, with every validation step behind us, touch the tracker.
        let request_id = match &request.request_id {
            Some(id) => {
                let id = id.clone();
                self.sessions.open(&id, &did, request).await?;
                id
            }
            None => self.open_with_generated_id(&did, request).await?,
        };

        tracing::info!(did = %did, method = %method, id = %request_id, "anp→mcp translated");

        Ok(McpRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method,
            params,
            id: request_id,
            oauth_token: Some(credential),
        })
    }

    /// Generate a collision-checked session key and open the session under
    /// it. `open` is the atomic authority, so a concurrent open of the same
    /// generated id simply triggers another attempt.
    async fn open_with_generated_id(&self, did: &str, request: AnpRequest) -> BridgeResult<String> {
        let mut last_err = None;
        for _ in 0..ID_GENERATION_ATTEMPTS {
            let candidate = generate_request_id();
            match self.sessions.open(&candidate, did, request.clone()).await {
                Ok(_) => return Ok(candidate),
                Err(e @ BridgeError::DuplicateSessionKey(_)) => {
                    tracing::debug!(id = %candidate, "generated id collided, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| BridgeError::DuplicateSessionKey(did.to_string())))
    }

    /// Translate an MCP response back into an ANP response, retiring the
    /// session. A response whose id matches no open session is unroutable:
    /// it is logged and dropped (`UnknownSession`) — there is no ANP caller
    /// to deliver it to.
    pub async fn translate_mcp_to_anp(&self, response: McpResponse) -> BridgeResult<AnpResponse> {
        // Retiring the session is the routability check: complete() removes
        // it in one atomic step, so a racing expiry cannot slip between a
        // lookup and the completion.
        let session = match self.sessions.complete(&response.id).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(id = %response.id, "unroutable MCP response dropped");
                return Err(e);
            }
        };

        tracing::info!(
            id = %response.id,
            did = %session.did,
            intent = %session.request.intent,
            "mcp→anp translated"
        );

        Ok(match response.payload {
            McpPayload::Result { result } => AnpResponse::success(response.id, result),
            McpPayload::Error { error } => AnpResponse::Error {
                request_id: response.id,
                error: crate::protocol::AnpError {
                    code: error.code.to_string(),
                    message: error.message,
                },
            },
        })
    }

    /// Full forward leg: translate, deliver through the transport adapter,
    /// translate the answer back. Every failure yields a structured ANP
    /// error response, and no failure leaves the session open.
    pub async fn forward(
        &self,
        transport: &dyn McpTransport,
        request: AnpRequest,
        timeout: Duration,
    ) -> AnpResponse {
        let fallback_id = request.request_id.clone().unwrap_or_default();

        let mcp_request = match self.translate_anp_to_mcp(request).await {
            Ok(req) => req,
            Err(e) => return AnpResponse::failure(fallback_id, &e),
        };
        let id = mcp_request.id.clone();

        let response = match tokio::time::timeout(timeout, transport.send(&mcp_request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                // Delete rather than leave Open, so a delayed retry response
                // cannot double-complete the session later.
                self.sessions.delete(&id).await;
                tracing::error!(id = %id, error = %e, "forward leg failed");
                return AnpResponse::failure(id, &e);
            }
            Err(_) => {
                self.sessions.delete(&id).await;
                let e = BridgeError::SessionTimeout(id.clone());
                tracing::error!(id = %id, "forward leg timed out after {}s", timeout.as_secs());
                return AnpResponse::failure(id, &e);
            }
        };

        match self.translate_mcp_to_anp(response).await {
            Ok(anp) => anp,
            Err(e) => {
                // The downstream answered with a foreign id; the session for
                // our request is still open and must not linger.
                self.sessions.delete(&id).await;
                AnpResponse::failure(id, &e)
            }
        }
    }
}

/// Session keys look like `req-1a2b3c4d`: short, log-friendly, and
/// collision-checked against the tracker before use.
fn generate_request_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("req-{}", &hex[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::McpErrorObject;
    use serde_json::{json, Map, Value};

    fn engine() -> BridgeEngine {
        BridgeEngine::new(
            Arc::new(IdentityRegistry::new()),
            Arc::new(IntentMap::builtin()),
            Arc::new(SessionTracker::new(Duration::from_secs(120))),
        )
    }

    fn anp_request(did: &str, intent: &str, parameters: Value) -> AnpRequest {
        AnpRequest {
            did: did.to_string(),
            intent: intent.to_string(),
            parameters: parameters.as_object().cloned().unwrap_or_else(Map::new),
            request_id: None,
        }
    }

    fn success_response(id: &str, result: Value) -> McpResponse {
        McpResponse::from_value(json!({"jsonrpc": "2.0", "id": id, "result": result})).unwrap()
    }

    #[tokio::test]
    async fn translates_registered_request_and_opens_session() {
        let engine = engine();
        engine.registry().register("did:example:123", "tok-abc").await;

        let mcp = engine
            .translate_anp_to_mcp(anp_request(
                "did:example:123",
                "查询用户信息",
                json!({"user_id": "12345"}),
            ))
            .await
            .unwrap();

        assert_eq!(mcp.jsonrpc, "2.0");
        assert_eq!(mcp.method, "getUserInfo");
        assert_eq!(mcp.params["userId"], "12345");
        assert_eq!(mcp.oauth_token.as_deref(), Some("tok-abc"));
        assert!(mcp.id.starts_with("req-"));
        assert!(engine.sessions().contains(&mcp.id).await);
    }

    #[tokio::test]
    async fn round_trip_preserves_id_and_result() {
        let engine = engine();
        engine.registry().register("did:example:123", "tok-abc").await;

        let mcp = engine
            .translate_anp_to_mcp(anp_request(
                "did:example:123",
                "查询用户信息",
                json!({"user_id": "12345"}),
            ))
            .await
            .unwrap();

        let anp = engine
            .translate_mcp_to_anp(success_response(&mcp.id, json!({"name": "张三", "age": 30})))
            .await
            .unwrap();

        match anp {
            AnpResponse::Success { request_id, result } => {
                assert_eq!(request_id, mcp.id);
                assert_eq!(result, json!({"name": "张三", "age": 30}));
            }
            AnpResponse::Error { .. } => panic!("expected success"),
        }
        // Session retired from the live set.
        assert!(!engine.sessions().contains(&mcp.id).await);
    }

    #[tokio::test]
    async fn caller_supplied_request_id_is_honored() {
        let engine = engine();
        engine.registry().register("did:example:123", "tok-abc").await;

        let mut request =
            anp_request("did:example:123", "查询天气", json!({"city": "上海"}));
        request.request_id = Some("req-caller-1".to_string());

        let mcp = engine.translate_anp_to_mcp(request).await.unwrap();
        assert_eq!(mcp.id, "req-caller-1");
        assert_eq!(mcp.params["cityName"], "上海");
    }

    #[tokio::test]
    async fn reused_in_flight_id_is_duplicate_session_key() {
        let engine = engine();
        engine.registry().register("did:example:123", "tok-abc").await;

        let mut request =
            anp_request("did:example:123", "查询天气", json!({"city": "上海"}));
        request.request_id = Some("req-dup".to_string());
        engine.translate_anp_to_mcp(request.clone()).await.unwrap();

        let err = engine.translate_anp_to_mcp(request).await.unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateSessionKey(_)));
    }

    #[tokio::test]
    async fn failed_validation_opens_no_session() {
        let engine = engine();
        engine.registry().register("did:example:123", "tok-abc").await;

        // Unknown identity.
        let err = engine
            .translate_anp_to_mcp(anp_request("did:example:999", "查询天气", json!({"city": "北京"})))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownIdentity(_)));

        // Unmapped intent.
        let err = engine
            .translate_anp_to_mcp(anp_request("did:example:123", "未知意图", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnmappedIntent(_)));

        // Missing required parameter.
        let err = engine
            .translate_anp_to_mcp(anp_request("did:example:123", "查询用户信息", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidParameters(_)));

        assert!(engine.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn mcp_error_becomes_anp_error_response() {
        let engine = engine();
        engine.registry().register("did:example:123", "tok-abc").await;

        let mcp = engine
            .translate_anp_to_mcp(anp_request(
                "did:example:123",
                "查询订单",
                json!({"order_id": "O-77"}),
            ))
            .await
            .unwrap();

        let response = McpResponse {
            jsonrpc: "2.0".to_string(),
            id: mcp.id.clone(),
            payload: McpPayload::Error {
                error: McpErrorObject {
                    code: -32601,
                    message: "Method not found".to_string(),
                    data: None,
                },
            },
        };

        let anp = engine.translate_mcp_to_anp(response).await.unwrap();
        match anp {
            AnpResponse::Error { request_id, error } => {
                assert_eq!(request_id, mcp.id);
                assert_eq!(error.code, "-32601");
                assert_eq!(error.message, "Method not found");
            }
            AnpResponse::Success { .. } => panic!("expected error"),
        }
        assert!(!engine.sessions().contains(&mcp.id).await);
    }

    #[tokio::test]
    async fn unroutable_response_is_dropped_without_side_effects() {
        let engine = engine();
        let err = engine
            .translate_mcp_to_anp(success_response("req-never-opened", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownSession(_)));
        assert!(engine.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn second_delivery_of_a_response_is_unroutable() {
        let engine = engine();
        engine.registry().register("did:example:123", "tok-abc").await;

        let mcp = engine
            .translate_anp_to_mcp(anp_request(
                "did:example:123",
                "查询天气",
                json!({"city": "广州"}),
            ))
            .await
            .unwrap();

        engine
            .translate_mcp_to_anp(success_response(&mcp.id, json!({"weather": "晴"})))
            .await
            .unwrap();
        let replay = engine
            .translate_mcp_to_anp(success_response(&mcp.id, json!({"weather": "雨"})))
            .await
            .unwrap_err();
        assert!(matches!(replay, BridgeError::UnknownSession(_)));
    }

    // ── forward leg ─────────────────────────────────────────────────────

    struct EchoTransport;

    #[async_trait::async_trait]
    impl McpTransport for EchoTransport {
        async fn send(&self, request: &McpRequest) -> BridgeResult<McpResponse> {
            Ok(McpResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id.clone(),
                payload: McpPayload::Result { result: json!({"echo": request.method}) },
            })
        }
    }

    struct FailingTransport;

    #[async_trait::async_trait]
    impl McpTransport for FailingTransport {
        async fn send(&self, _request: &McpRequest) -> BridgeResult<McpResponse> {
            Err(BridgeError::TransportFailure("connection refused".to_string()))
        }
    }

    struct HangingTransport;

    #[async_trait::async_trait]
    impl McpTransport for HangingTransport {
        async fn send(&self, request: &McpRequest) -> BridgeResult<McpResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(McpResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id.clone(),
                payload: McpPayload::Result { result: Value::Null },
            })
        }
    }

    #[tokio::test]
    async fn forward_round_trips_through_the_transport() {
        let engine = engine();
        engine.registry().register("did:example:123", "tok-abc").await;

        let anp = engine
            .forward(
                &EchoTransport,
                anp_request("did:example:123", "查询天气", json!({"city": "北京"})),
                Duration::from_secs(5),
            )
            .await;

        assert!(anp.is_success());
        assert!(engine.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn transport_failure_deletes_the_session() {
        let engine = engine();
        engine.registry().register("did:example:123", "tok-abc").await;

        let anp = engine
            .forward(
                &FailingTransport,
                anp_request("did:example:123", "查询天气", json!({"city": "北京"})),
                Duration::from_secs(5),
            )
            .await;

        match &anp {
            AnpResponse::Error { error, .. } => {
                assert_eq!(error.code, "transport_failure");
                assert!(error.message.contains("connection refused"));
            }
            AnpResponse::Success { .. } => panic!("expected error"),
        }
        assert!(engine.sessions().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_timeout_is_session_timeout() {
        let engine = engine();
        engine.registry().register("did:example:123", "tok-abc").await;

        let anp = engine
            .forward(
                &HangingTransport,
                anp_request("did:example:123", "查询天气", json!({"city": "北京"})),
                Duration::from_secs(1),
            )
            .await;

        match &anp {
            AnpResponse::Error { error, .. } => assert_eq!(error.code, "session_timeout"),
            AnpResponse::Success { .. } => panic!("expected error"),
        }
        assert!(engine.sessions().is_empty().await);
    }
}
