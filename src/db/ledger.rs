//! `VerificationLedger` over SQLite.

use async_trait::async_trait;

use super::models::{VerificationRecord, VerificationRow, VerificationState, VerificationWrite};
use super::{Database, LedgerCounts, StoreError, StoreResult, VerificationLedger};

const RECORD_COLUMNS: &str =
    "id, donation_id, state, transaction_hash, block_number, timestamp, verified";

#[async_trait]
impl VerificationLedger for Database {
    async fn find_by_donation(&self, donation_id: i64) -> StoreResult<Option<VerificationRecord>> {
        let row = sqlx::query_as::<_, VerificationRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM verification_records WHERE donation_id = ?"
        ))
        .bind(donation_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(VerificationRecord::try_from).transpose()
    }

    async fn insert(
        &self,
        donation_id: i64,
        write: &VerificationWrite,
    ) -> StoreResult<VerificationRecord> {
        let row = sqlx::query_as::<_, VerificationRow>(&format!(
            r#"
            INSERT INTO verification_records (
                donation_id, state, transaction_hash, block_number, timestamp, verified
            )
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(donation_id)
        .bind(write.state.as_str())
        .bind(&write.transaction_hash)
        .bind(write.block_number)
        .bind(write.timestamp)
        .bind(write.is_verified())
        .fetch_one(self.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(donation_id)
            }
            other => StoreError::Database(other),
        })?;

        VerificationRecord::try_from(row)
    }

    async fn update_unverified(
        &self,
        record_id: i64,
        write: &VerificationWrite,
    ) -> StoreResult<Option<VerificationRecord>> {
        let row = sqlx::query_as::<_, VerificationRow>(&format!(
            r#"
            UPDATE verification_records
            SET state = ?, transaction_hash = ?, block_number = ?, timestamp = ?, verified = ?
            WHERE id = ? AND verified = 0
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(write.state.as_str())
        .bind(&write.transaction_hash)
        .bind(write.block_number)
        .bind(write.timestamp)
        .bind(write.is_verified())
        .bind(record_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(VerificationRecord::try_from).transpose()
    }

    async fn list_by_state(
        &self,
        state: VerificationState,
        limit: Option<u32>,
    ) -> StoreResult<Vec<VerificationRecord>> {
        let rows = sqlx::query_as::<_, VerificationRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM verification_records \
             WHERE state = ? ORDER BY timestamp ASC, id ASC LIMIT ?"
        ))
        .bind(state.as_str())
        // SQLite treats a negative LIMIT as unbounded.
        .bind(limit.map_or(-1, i64::from))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(VerificationRecord::try_from).collect()
    }

    async fn count_by_verified(&self) -> StoreResult<LedgerCounts> {
        let (verified, total): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(CASE WHEN verified = 1 THEN 1 ELSE 0 END), 0), COUNT(*) \
             FROM verification_records",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(LedgerCounts {
            verified,
            unverified: total - verified,
        })
    }
}
