//! Process configuration: CLI flags layered over environment variables.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// ANP⇄MCP bidirectional translation bridge.
#[derive(Debug, Clone, Parser)]
#[command(name = "anp-mcp-bridge", version)]
pub struct Cli {
    /// Bind address.
    #[arg(long, env = "BRIDGE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Verbose (debug-level) logging.
    #[arg(long)]
    pub debug: bool,

    /// Run the built-in self-test against an in-process engine and exit.
    #[arg(long)]
    pub self_test: bool,

    /// Run the demonstration client against a running bridge and exit.
    #[arg(long)]
    pub demo_client: bool,

    /// Downstream MCP endpoint. When set, POST /anp-to-mcp performs the full
    /// forward leg instead of returning the translated envelope.
    #[arg(long, env = "DOWNSTREAM_MCP_URL")]
    pub downstream: Option<String>,

    /// JSON file with intent→method mappings (defaults to the built-in table).
    #[arg(long, env = "INTENT_MAP_PATH")]
    pub intent_map: Option<PathBuf>,

    /// Seconds an open session may wait for its MCP response before the
    /// sweep expires it.
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = 120)]
    pub session_ttl_secs: u64,

    /// Seconds between expiry sweeps.
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 5)]
    pub sweep_interval_secs: u64,

    /// Seconds to wait for a downstream MCP call on the forward leg.
    #[arg(long, env = "TRANSPORT_TIMEOUT_SECS", default_value_t = 30)]
    pub transport_timeout_secs: u64,
}

/// Runtime knobs shared through `AppState`.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
    pub transport_timeout: Duration,
    pub downstream: Option<String>,
}

impl BridgeConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            session_ttl: Duration::from_secs(cli.session_ttl_secs),
            sweep_interval: Duration::from_secs(cli.sweep_interval_secs),
            transport_timeout: Duration::from_secs(cli.transport_timeout_secs),
            downstream: cli.downstream.clone(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(5),
            transport_timeout: Duration::from_secs(30),
            downstream: None,
        }
    }
}
