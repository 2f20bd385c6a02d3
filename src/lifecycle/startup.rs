//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every service from validated configuration
//! - Start the metrics exporter when enabled
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Services are built before the listener binds, so traffic only
//!   arrives once the edge can answer it

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::EdgeConfig;
use crate::error::BuildError;
use crate::http::EdgeServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the edge until SIGINT/SIGTERM.
pub async fn run(config: EdgeConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr);
    }

    let server = EdgeServer::new(config)?;

    let address = server.config().listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    server.run(listener, receiver).await?;
    Ok(())
}
