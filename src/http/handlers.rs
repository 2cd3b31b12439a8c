//! Public API handlers.
//!
//! Thin wrappers: validate input, call the donation store or the
//! verification service, map errors through `ApiError`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::blockchain::{CharityFlow, OnChainDonation};
use crate::config::VerificationMode;
use crate::db::{Donation, DonationStore, NewDonation, VerificationRecord};
use crate::http::error::ApiError;
use crate::http::run_detached;
use crate::http::server::AppState;
use crate::verification::{VerificationStats, VerificationStatus};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
    /// `None` when blockchain integration is disabled.
    pub chain: Option<bool>,
}

/// Liveness plus dependency reachability. Only the database is required
/// for a 200; an unreachable chain degrades to retryable verifications.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.db.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    };
    let chain = if state.config.blockchain.enabled {
        Some(state.chain.is_healthy().await)
    } else {
        None
    };

    let (status, label) = match (database, chain) {
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
        (true, Some(false)) => (StatusCode::OK, "degraded"),
        _ => (StatusCode::OK, "ok"),
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            database,
            chain,
        }),
    )
}

fn validate_new_donation(new: &NewDonation) -> Result<(), ApiError> {
    if new.amount_cents <= 0 {
        return Err(ApiError::BadRequest("amount_cents must be positive".to_string()));
    }
    if new.currency.len() != 3 || !new.currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::BadRequest(format!(
            "currency '{}' is not a three-letter code",
            new.currency
        )));
    }
    if new.donor_id.trim().is_empty() {
        return Err(ApiError::BadRequest("donor_id is required".to_string()));
    }
    if new.charity_id.trim().is_empty() {
        return Err(ApiError::BadRequest("charity_id is required".to_string()));
    }
    Ok(())
}

/// Record a payment intent.
pub async fn create_donation(
    State(state): State<AppState>,
    Json(new): Json<NewDonation>,
) -> Result<(StatusCode, Json<Donation>), ApiError> {
    validate_new_donation(&new)?;
    let donation = state.db.create_donation(&new).await?;
    tracing::info!(
        donation_id = donation.id,
        transaction_id = %donation.transaction_id,
        charity_id = %donation.charity_id,
        amount_cents = donation.amount_cents,
        "Donation created"
    );
    Ok((StatusCode::CREATED, Json(donation)))
}

pub async fn get_donation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Donation>, ApiError> {
    state
        .db
        .get_donation(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("donation {}", id)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmResponse {
    pub donation: Donation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_error: Option<String>,
}

/// Payment succeeded: mark the donation and hand it to the verifier.
/// A verification failure is reported but never undoes the payment.
pub async fn confirm_donation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let donation = state.db.mark_succeeded(id).await?;

    let service = state.verification.clone();
    let mode = state.config.verification.mode;
    let outcome = run_detached(async move {
        match mode {
            VerificationMode::Inline => service.verify_donation(id).await,
            VerificationMode::Deferred => service.enqueue_verification(id).await,
        }
    })
    .await?;

    let (verification, verification_error) = match outcome {
        Ok(record) => (Some(record), None),
        Err(e) => {
            tracing::warn!(donation_id = id, error = %e, "Verification after payment failed");
            (None, Some(e.to_string()))
        }
    };

    Ok(Json(ConfirmResponse {
        donation,
        verification,
        verification_error,
    }))
}

pub async fn verify_donation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<VerificationRecord>, ApiError> {
    let service = state.verification.clone();
    let record = run_detached(async move { service.verify_donation(id).await }).await??;
    Ok(Json(record))
}

pub async fn get_verification_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<VerificationStatus>, ApiError> {
    Ok(Json(state.verification.get_verification_status(id).await?))
}

pub async fn get_verification_stats(
    State(state): State<AppState>,
) -> Result<Json<VerificationStats>, ApiError> {
    Ok(Json(state.verification.get_verification_stats().await?))
}

/// Read a donation back from the ledger contract by its on-chain id.
pub async fn get_chain_donation(
    State(state): State<AppState>,
    Path(chain_donation_id): Path<u64>,
) -> Result<Json<OnChainDonation>, ApiError> {
    Ok(Json(state.chain.get_donation(chain_donation_id).await?))
}

pub async fn get_charity_flow(
    State(state): State<AppState>,
    Path(charity_id): Path<String>,
) -> Result<Json<CharityFlow>, ApiError> {
    Ok(Json(state.chain.get_charity_flow(&charity_id).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainDonationsResponse {
    pub charity_id: String,
    pub count: usize,
    pub donation_ids: Vec<String>,
}

pub async fn get_charity_chain_donations(
    State(state): State<AppState>,
    Path(charity_id): Path<String>,
) -> Result<Json<ChainDonationsResponse>, ApiError> {
    let donation_ids = state.chain.get_donations_by_charity(&charity_id).await?;
    Ok(Json(ChainDonationsResponse {
        charity_id,
        count: donation_ids.len(),
        donation_ids,
    }))
}
