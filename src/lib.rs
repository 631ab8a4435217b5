pub mod auth;
pub mod bridge;
pub mod config;
pub mod error;
pub mod handlers;
pub mod intent;
pub mod protocol;
pub mod registry;
pub mod selftest;
pub mod session;
pub mod state;
pub mod transport;

use axum::routing::{delete, get, post};
use axum::Router;

use state::AppState;

/// Build the application router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    // Background expiry sweep — retires sessions whose MCP call never
    // returned, so the live set cannot grow without bound.
    session::spawn_sweeper(state.bridge.sessions_arc(), state.config.sweep_interval);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/capabilities", get(handlers::capabilities))
        .route("/register", post(handlers::register))
        .route("/anp-to-mcp", post(handlers::anp_to_mcp))
        .route("/mcp-to-anp", post(handlers::mcp_to_anp))
        .route(
            "/sessions/{request_id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .with_state(state)
}
