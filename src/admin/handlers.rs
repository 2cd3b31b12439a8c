use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::VerificationMode;
use crate::db::Donation;
use crate::http::error::ApiError;
use crate::http::run_detached;
use crate::http::server::AppState;
use crate::verification::{BatchOutcome, RetrySummary, VerificationStats};

const DEFAULT_UNVERIFIED_LIMIT: u32 = 50;
const MAX_UNVERIFIED_LIMIT: u32 = 500;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub database_healthy: bool,
    pub chain_enabled: bool,
    pub chain_healthy: bool,
    pub verification_mode: VerificationMode,
    pub stats: VerificationStats,
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<SystemStatus>, ApiError> {
    let database_healthy = state.db.health_check().await.is_ok();
    let chain_healthy = state.chain.is_healthy().await;
    let stats = state.verification.get_verification_stats().await?;

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: if database_healthy { "operational" } else { "degraded" }.to_string(),
        database_healthy,
        chain_enabled: state.config.blockchain.enabled,
        chain_healthy,
        verification_mode: state.config.verification.mode,
        stats,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UnverifiedQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnverifiedResponse {
    pub count: usize,
    pub donations: Vec<Donation>,
}

/// Successful donations without a verified record, oldest first.
pub async fn list_unverified(
    State(state): State<AppState>,
    Query(query): Query<UnverifiedQuery>,
) -> Result<Json<UnverifiedResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_UNVERIFIED_LIMIT)
        .clamp(1, MAX_UNVERIFIED_LIMIT);
    let donations = state.verification.unverified_donations(limit).await?;
    Ok(Json(UnverifiedResponse {
        count: donations.len(),
        donations,
    }))
}

pub async fn retry_failed(State(state): State<AppState>) -> Result<Json<RetrySummary>, ApiError> {
    let service = state.verification.clone();
    let summary =
        run_detached(async move { service.retry_failed_verifications(None).await }).await??;
    tracing::info!(
        retried = summary.retried,
        successful = summary.successful,
        failed = summary.failed,
        "Admin retry finished"
    );
    Ok(Json(summary))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchRequest {
    pub donation_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchOutcome>,
}

pub async fn batch_verify(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let max = state.config.verification.max_batch_size;
    if request.donation_ids.is_empty() {
        return Err(ApiError::BadRequest("donation_ids must not be empty".to_string()));
    }
    if request.donation_ids.len() > max {
        return Err(ApiError::BadRequest(format!(
            "at most {} donation ids per batch, got {}",
            max,
            request.donation_ids.len()
        )));
    }

    let service = state.verification.clone();
    let ids = request.donation_ids;
    let results = run_detached(async move { service.batch_verify_donations(&ids).await }).await?;
    let succeeded = results.iter().filter(|r| r.success).count();

    Ok(Json(BatchResponse {
        total: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        results,
    }))
}
