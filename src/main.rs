use axum::http::header;
use axum::http::HeaderValue;
use clap::Parser;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use anp_mcp_bridge::config::{BridgeConfig, Cli};
use anp_mcp_bridge::intent::IntentMap;
use anp_mcp_bridge::selftest;
use anp_mcp_bridge::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(cli.debug);

    let intents = match &cli.intent_map {
        Some(path) => IntentMap::from_path(path)?,
        None => IntentMap::builtin(),
    };
    let config = BridgeConfig::from_cli(&cli);
    let state = AppState::new(intents, config);

    if cli.self_test {
        selftest::run(&state).await?;
        return Ok(());
    }
    if cli.demo_client {
        let base_url = format!("http://{}:{}", demo_host(&cli.host), cli.port);
        selftest::run_demo_client(&base_url).await?;
        return Ok(());
    }

    // CORS is permissive — the bridge is protocol plumbing, not a browser app.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let nosniff: SetResponseHeaderLayer<HeaderValue> = SetResponseHeaderLayer::overriding(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    let frame_deny: SetResponseHeaderLayer<HeaderValue> = SetResponseHeaderLayer::overriding(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    );

    // Rate limiting: 30 req burst, replenish 1 per 2 seconds, per IP
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(30)
        .finish()
        .expect("governor config");

    let app = anp_mcp_bridge::create_router(state)
        .layer(GovernorLayer::new(governor_conf))
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(cors)
        .layer(nosniff)
        .layer(frame_deny)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        );

    let addr: std::net::SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    tracing::info!("anp-mcp-bridge listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().with_env_filter(env_filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

/// The demo client connects to the bridge; an 0.0.0.0 bind address is not a
/// connectable host.
fn demo_host(host: &str) -> &str {
    if host == "0.0.0.0" {
        "127.0.0.1"
    } else {
        host
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
