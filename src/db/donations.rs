//! `DonationStore` over SQLite.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::models::{Donation, DonationRow, NewDonation, PaymentStatus};
use super::{Database, DonationStore, StoreError, StoreResult};

const DONATION_COLUMNS: &str = "id, amount_cents, currency, transaction_id, payment_status, \
     donor_id, charity_id, project_id, anonymous, created_at";

#[async_trait]
impl DonationStore for Database {
    async fn get_donation(&self, id: i64) -> StoreResult<Option<Donation>> {
        let row = sqlx::query_as::<_, DonationRow>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(Donation::try_from).transpose()
    }

    async fn create_donation(&self, new: &NewDonation) -> StoreResult<Donation> {
        let transaction_id = format!("txn_{}", Uuid::new_v4().simple());

        let row = sqlx::query_as::<_, DonationRow>(&format!(
            r#"
            INSERT INTO donations (
                amount_cents, currency, transaction_id, payment_status,
                donor_id, charity_id, project_id, anonymous, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {DONATION_COLUMNS}
            "#
        ))
        .bind(new.amount_cents)
        .bind(new.currency.to_lowercase())
        .bind(&transaction_id)
        .bind(PaymentStatus::Pending.as_str())
        .bind(&new.donor_id)
        .bind(&new.charity_id)
        .bind(&new.project_id)
        .bind(new.anonymous)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        let donation = Donation::try_from(row)?;
        tracing::info!(
            donation_id = donation.id,
            transaction_id = %donation.transaction_id,
            charity_id = %donation.charity_id,
            "Payment intent recorded"
        );
        Ok(donation)
    }

    async fn mark_succeeded(&self, id: i64) -> StoreResult<Donation> {
        let updated = sqlx::query_as::<_, DonationRow>(&format!(
            r#"
            UPDATE donations SET payment_status = ?
            WHERE id = ? AND payment_status = ?
            RETURNING {DONATION_COLUMNS}
            "#
        ))
        .bind(PaymentStatus::Succeeded.as_str())
        .bind(id)
        .bind(PaymentStatus::Pending.as_str())
        .fetch_optional(self.pool())
        .await?;

        if let Some(row) = updated {
            return Donation::try_from(row);
        }

        let current = self
            .get_donation(id)
            .await?
            .ok_or_else(|| StoreError::Missing(format!("donation {}", id)))?;

        match current.payment_status {
            PaymentStatus::Succeeded => Ok(current),
            from => Err(StoreError::InvalidTransition {
                id,
                from,
                to: PaymentStatus::Succeeded,
            }),
        }
    }

    async fn count_successful(&self) -> StoreResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM donations WHERE payment_status = ?")
                .bind(PaymentStatus::Succeeded.as_str())
                .fetch_one(self.pool())
                .await?;
        Ok(count)
    }

    async fn list_unverified(&self, limit: u32) -> StoreResult<Vec<Donation>> {
        let rows = sqlx::query_as::<_, DonationRow>(
            r#"
            SELECT d.id, d.amount_cents, d.currency, d.transaction_id, d.payment_status,
                   d.donor_id, d.charity_id, d.project_id, d.anonymous, d.created_at
            FROM donations d
            LEFT JOIN verification_records v ON v.donation_id = d.id
            WHERE d.payment_status = ?
              AND (v.id IS NULL OR v.verified = 0)
            ORDER BY d.created_at ASC, d.id ASC
            LIMIT ?
            "#,
        )
        .bind(PaymentStatus::Succeeded.as_str())
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(Donation::try_from).collect()
    }
}
