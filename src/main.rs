//! Edge gateway.
//!
//! Admits clients by IP whitelist, rate limits them per IP, authenticates
//! protected routes with session tokens and forwards the rest round-robin
//! to a pool of upstream gateways.
//!
//! # Architecture Overview
//!
//! ```text
//!  client ──▶ http::server ──▶ pipeline ──────────────────────▶ http::proxy ──▶ upstream
//!                               │ security::whitelist (cache)        │
//!                               │ security::rate_limit               └─ load_balancer
//!                               │ security::auth (protected routes)
//!                               ▼
//!                           /login, /data
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use edge_gateway::config::load_config;
use edge_gateway::lifecycle;
use edge_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "IP-whitelisting, rate-limiting, token-checking edge gateway", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults and environment apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("edge-gateway: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstreams = ?config.upstreams.targets,
        cache_backend = ?config.cache.backend,
        "Configuration loaded"
    );

    match lifecycle::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Edge gateway failed");
            ExitCode::FAILURE
        }
    }
}
