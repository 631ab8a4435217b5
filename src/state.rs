//! Central application state. Clone-friendly — every field is an Arc or Copy.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;

use crate::bridge::BridgeEngine;
use crate::config::BridgeConfig;
use crate::intent::IntentMap;
use crate::registry::IdentityRegistry;
use crate::session::SessionTracker;
use crate::transport::{HttpTransport, McpTransport};

#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<BridgeEngine>,
    /// Transport for the forward leg; None when no downstream is configured.
    pub transport: Option<Arc<dyn McpTransport>>,
    pub config: Arc<BridgeConfig>,
    pub start_time: Instant,
    /// Optional auth secret from AUTH_SECRET env. None = dev mode (no auth
    /// on the admin routes).
    pub auth_secret: Option<String>,
}

impl AppState {
    pub fn new(intents: IntentMap, config: BridgeConfig) -> Self {
        let registry = Arc::new(IdentityRegistry::with_test_identities());
        let sessions = Arc::new(SessionTracker::new(config.session_ttl));
        let bridge = Arc::new(BridgeEngine::new(registry, Arc::new(intents), sessions));

        let transport: Option<Arc<dyn McpTransport>> = config.downstream.as_ref().map(|url| {
            let client = Client::builder()
                .pool_max_idle_per_host(10)
                .connect_timeout(std::time::Duration::from_secs(5))
                .build()
                .expect("Failed to build HTTP client");
            Arc::new(HttpTransport::new(client, url.clone(), config.transport_timeout))
                as Arc<dyn McpTransport>
        });

        let auth_secret = std::env::var("AUTH_SECRET").ok().filter(|s| !s.is_empty());
        if auth_secret.is_some() {
            tracing::info!("AUTH_SECRET configured — admin routes require Bearer auth");
        } else {
            tracing::info!("AUTH_SECRET not set — admin routes open (dev mode)");
        }

        tracing::info!(
            intents = bridge.intents().len(),
            downstream = config.downstream.as_deref().unwrap_or("none"),
            ttl_secs = config.session_ttl.as_secs(),
            "AppState initialised"
        );

        Self {
            bridge,
            transport,
            config: Arc::new(config),
            start_time: Instant::now(),
            auth_secret,
        }
    }
}
