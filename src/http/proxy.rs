//! Round-robin streaming forwarder.
//!
//! # Responsibilities
//! - Pick the next upstream target in rotation
//! - Rewrite the request onto that target, cleaning hop-by-hop headers
//! - Stream the request body up and the response body back without buffering
//!
//! # Design Decisions
//! - The upstream timeout is an idle limit: it runs from the last request body
//!   frame handed to the upstream until response headers arrive, so a slow but
//!   steady upload is not cut off. A response body that is already streaming
//!   is never cut off
//! - Upstream status codes pass through untouched, 4xx and 5xx included
//! - Every response names the target it came from in `X-Gateway-Used`

use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, Request},
    response::Response,
};
use http_body_util::BodyExt;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::load_balancer::{TargetError, UpstreamPool};
use crate::security::headers::prepare_forward_headers;
use crate::security::ClientIdentity;

/// Diagnostic response header naming the upstream that served the request.
pub const X_GATEWAY_USED: &str = "x-gateway-used";

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("no upstream targets configured")]
    NoTargets,

    #[error("cannot build upstream request: {0}")]
    BuildRequest(String),

    #[error("upstream {target} unreachable: {reason}")]
    Unreachable { target: String, reason: String },

    #[error("upstream {target} timed out")]
    Timeout { target: String },
}

/// Outcome of a forwarded request: the response plus the target that served it.
pub struct Forwarded {
    pub target: String,
    pub response: Response,
}

/// Forwards requests to the upstream pool.
pub struct Forwarder {
    pool: UpstreamPool,
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
}

impl Forwarder {
    pub fn new(pool: UpstreamPool, connect_timeout: Duration, upstream_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            pool,
            client,
            upstream_timeout,
        }
    }

    pub fn from_config(upstreams: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, TargetError> {
        Ok(Self::new(
            UpstreamPool::from_config(upstreams)?,
            Duration::from_secs(timeouts.connect_secs),
            Duration::from_secs(timeouts.upstream_secs),
        ))
    }

    /// Send `request` to the next target on behalf of `client`.
    pub async fn forward(
        &self,
        request: Request<Body>,
        client: &ClientIdentity,
    ) -> Result<Forwarded, ForwardError> {
        let target = self.pool.select().ok_or(ForwardError::NoTargets)?;
        let (mut parts, body) = request.into_parts();

        let uri = target
            .uri_for(parts.uri.path(), parts.uri.query())
            .map_err(|e| ForwardError::BuildRequest(e.to_string()))?;
        prepare_forward_headers(&mut parts.headers, client);

        let (activity, last_activity) = watch::channel(Instant::now());
        let body = Body::new(UploadProgress { inner: body, activity });

        let mut outbound = Request::builder()
            .method(parts.method)
            .uri(uri)
            .body(body)
            .map_err(|e| ForwardError::BuildRequest(e.to_string()))?;
        *outbound.headers_mut() = parts.headers;

        tracing::debug!(
            target_url = %target,
            method = %outbound.method(),
            uri = %outbound.uri(),
            "Forwarding request"
        );

        let response = tokio::select! {
            result = self.client.request(outbound) => match result {
                Ok(response) => response,
                Err(e) => {
                    return Err(ForwardError::Unreachable {
                        target: target.label().to_string(),
                        reason: e.to_string(),
                    })
                }
            },
            _ = idle_deadline(last_activity, self.upstream_timeout) => {
                return Err(ForwardError::Timeout {
                    target: target.label().to_string(),
                })
            }
        };

        let (mut parts, body) = response.into_parts();
        if let Ok(value) = HeaderValue::from_str(target.label()) {
            parts.headers.insert(X_GATEWAY_USED, value);
        }

        let label = target.label().to_string();
        let body = body.map_err(move |e: hyper::Error| {
            tracing::warn!(target_url = %label, error = %e, "Upstream body stream aborted");
            e
        });

        Ok(Forwarded {
            target: target.label().to_string(),
            response: Response::from_parts(parts, Body::new(body)),
        })
    }
}

/// Request body wrapper that stamps the time of every frame handed upstream.
struct UploadProgress {
    inner: Body,
    activity: watch::Sender<Instant>,
}

impl HttpBody for UploadProgress {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = &mut *self;
        let frame = ready!(Pin::new(&mut this.inner).poll_frame(cx));
        this.activity.send_replace(Instant::now());
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Resolves once `limit` has passed since the last upload activity.
///
/// The sender is dropped with the body once the upload finishes; from then on
/// the last stamp is final.
async fn idle_deadline(mut activity: watch::Receiver<Instant>, limit: Duration) {
    loop {
        let deadline = *activity.borrow_and_update() + limit;
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return,
            changed = activity.changed() => {
                if changed.is_err() {
                    let deadline = *activity.borrow() + limit;
                    tokio::time::sleep_until(deadline).await;
                    return;
                }
            }
        }
    }
}
