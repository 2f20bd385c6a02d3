//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: `/login`, protected `/data`, catch-all proxy
//! - Wire up middleware (request ID, tracing, admission, login body limit)
//! - Bind the router to a listener and serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::Request,
    middleware::from_fn_with_state,
    response::Response,
    routing::{any, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::EdgeConfig;
use crate::error::{BuildError, EdgeError};
use crate::http::data::DataClient;
use crate::http::middleware::{protected_admission, public_admission};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::observability::metrics;
use crate::pipeline::{Admission, EdgePipeline};
use crate::security::SessionToken;

/// Largest accepted `/login` body. Proxied bodies are not limited.
pub const LOGIN_BODY_LIMIT: usize = 64 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EdgePipeline>,
    pub data: Arc<DataClient>,
}

/// Everything the server needs to handle requests.
pub struct EdgeServices {
    pub pipeline: EdgePipeline,
    pub data: DataClient,
}

impl EdgeServices {
    pub fn from_config(config: &EdgeConfig) -> Result<Self, BuildError> {
        Ok(Self {
            pipeline: EdgePipeline::from_config(config)?,
            data: DataClient::from_config(&config.data_service, &config.timeouts)?,
        })
    }
}

/// HTTP server for the edge.
pub struct EdgeServer {
    router: Router,
    config: EdgeConfig,
}

impl EdgeServer {
    /// Build every service from `config`.
    pub fn new(config: EdgeConfig) -> Result<Self, BuildError> {
        let services = EdgeServices::from_config(&config)?;
        Ok(Self::with_services(config, services))
    }

    /// Use pre-built services.
    pub fn with_services(config: EdgeConfig, services: EdgeServices) -> Self {
        let state = AppState {
            pipeline: Arc::new(services.pipeline),
            data: Arc::new(services.data),
        };
        let router = Self::build_router(state);
        Self { router, config }
    }

    fn build_router(state: AppState) -> Router {
        let public = Router::new()
            .route("/login", post(login_handler).layer(RequestBodyLimitLayer::new(LOGIN_BODY_LIMIT)))
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .route_layer(from_fn_with_state(state.clone(), public_admission));

        let protected = Router::new()
            .route("/data", get(data_handler))
            .route_layer(from_fn_with_state(state.clone(), protected_admission));

        Router::new()
            .merge(public)
            .merge(protected)
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %req.request_id(),
                )
            }))
            .layer(set_request_id_layer())
    }

    /// The router, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            targets = self.config.upstreams.targets.len(),
            "Edge server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("Edge server stopped");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: SessionToken,
}

async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, EdgeError> {
    let Json(login) = payload.map_err(|e| EdgeError::BadRequest(format!("invalid login body: {}", e.body_text())))?;
    if login.username.is_empty() || login.password.is_empty() {
        return Err(EdgeError::BadRequest("username and password are required".to_string()));
    }

    let token = state
        .pipeline
        .authenticator()
        .issue_token(&login.username, &login.password)?;
    tracing::info!(username = %login.username, "Session token issued");
    Ok(Json(LoginResponse { token }))
}

async fn data_handler(
    State(state): State<AppState>,
    Extension(admission): Extension<Admission>,
) -> Result<Json<Value>, EdgeError> {
    let start = Instant::now();
    let result = state.data.fetch().await;
    let status = match &result {
        Ok(_) => 200,
        Err(e) => e.status_code().as_u16(),
    };
    metrics::record_request("GET", status, "data-service", start);

    let payload = result?;
    tracing::debug!(
        client = %admission.client,
        subject = admission.claims.as_ref().map(|c| c.sub.as_str()).unwrap_or_default(),
        "Data served"
    );
    Ok(Json(json!({ "data": payload })))
}

/// Forward anything else to the upstream pool.
async fn proxy_handler(
    State(state): State<AppState>,
    Extension(admission): Extension<Admission>,
    request: Request<Body>,
) -> Result<Response, EdgeError> {
    let start = Instant::now();
    let method = request.method().to_string();

    match state.pipeline.forward(request, &admission).await {
        Ok(forwarded) => {
            metrics::record_request(&method, forwarded.response.status().as_u16(), &forwarded.target, start);
            Ok(forwarded.response)
        }
        Err(e) => {
            metrics::record_request(&method, e.status_code().as_u16(), "none", start);
            Err(e)
        }
    }
}
