//! Admission middleware.
//! Runs the pipeline's checks before any handler sees the request.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::server::AppState;
use crate::pipeline::Protection;

/// Whitelist and rate limit.
pub async fn public_admission(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    admit(state, peer, req, next, Protection::Public).await
}

/// Whitelist, rate limit and a valid session token.
pub async fn protected_admission(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    admit(state, peer, req, next, Protection::Bearer).await
}

async fn admit(
    state: AppState,
    peer: SocketAddr,
    mut req: Request<Body>,
    next: Next,
    protection: Protection,
) -> Response {
    let client = state.pipeline.resolve_client(peer, req.headers());
    match state.pipeline.admit(client, req.headers(), protection).await {
        Ok(admission) => {
            tracing::debug!(client = %client, path = %req.uri().path(), "Request admitted");
            req.extensions_mut().insert(admission);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}
