//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit, metrics)
//! - Serve until the shutdown broadcast fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::blockchain::ChainClient;
use crate::config::CharitraceConfig;
use crate::db::Database;
use crate::http::handlers;
use crate::http::middleware::track_metrics;
use crate::http::request_id_of;
use crate::verification::VerificationService;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub chain: Arc<dyn ChainClient>,
    pub verification: Arc<VerificationService>,
    pub config: Arc<CharitraceConfig>,
}

/// HTTP server for the donation and verification API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    /// Run the server on `listener` until `shutdown` fires, then drain
    /// in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/donations", post(handlers::create_donation))
        .route("/api/donations/{id}", get(handlers::get_donation))
        .route("/api/donations/{id}/confirm", post(handlers::confirm_donation))
        .route("/api/donations/{id}/verify", post(handlers::verify_donation))
        .route(
            "/api/donations/{id}/verification",
            get(handlers::get_verification_status),
        )
        .route("/api/verification/stats", get(handlers::get_verification_stats))
        .route("/api/chain/donations/{id}", get(handlers::get_chain_donation))
        .route("/api/charities/{id}/flow", get(handlers::get_charity_flow))
        .route(
            "/api/charities/{id}/chain-donations",
            get(handlers::get_charity_chain_donations),
        );

    if config.admin.enabled {
        routes = routes.merge(admin::admin_router(state.clone()));
    }

    routes
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id_of(request),
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(config.server.max_body_size))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.request_timeout_secs,
                ))),
        )
}
