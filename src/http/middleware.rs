//! Request middleware.

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::request_id_of;
use crate::observability::metrics;

/// Record count and latency per matched route.
///
/// Installed with `route_layer` so the matched path is available.
pub async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let request_id = request_id_of(&request);

    let response = next.run(request).await;
    let status = response.status().as_u16();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        route = %route,
        status,
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    metrics::record_request(&method, &route, status, start);
    response
}
