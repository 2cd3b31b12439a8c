//! Operator endpoints under `/admin`, guarded by a bearer API key.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::http::server::AppState;
use self::auth::admin_auth_middleware;
use self::handlers::*;

pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/verification/unverified", get(list_unverified))
        .route("/admin/verification/retry", post(retry_failed))
        .route("/admin/verification/batch", post(batch_verify))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
