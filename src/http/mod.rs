//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, tower-http layers: request id, trace,
//!       timeout, body limit)
//!     → middleware.rs (per-route metrics)
//!     → handlers.rs / admin (call store or verification service)
//!     → error.rs (ApiError → JSON {error, code})
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;

use std::future::Future;

use axum::http::Request;

pub use error::ApiError;
pub use server::{AppState, HttpServer};

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request id set by `SetRequestIdLayer`, or `"unknown"`.
pub fn request_id_of<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Run `work` on its own task and wait for it.
///
/// A timed-out or disconnected request drops only the wait. The task still
/// finishes, so a submitted chain transaction is always followed by its
/// ledger write.
pub(crate) async fn run_detached<F>(work: F) -> Result<F::Output, ApiError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| ApiError::Internal(format!("background task failed: {}", e)))
}
