//! Repository for the `customers` table.
//!
//! The worker-facing operations are [`CustomerRepo::next_with_status`],
//! [`CustomerRepo::try_claim`], [`CustomerRepo::mark_sent`],
//! [`CustomerRepo::mark_failed`] and [`CustomerRepo::reclaim_stale`]. The
//! rest are the operator surface (dashboard and unsubscribe endpoint).

use coldmail_core::types::{DbId, Timestamp};
use coldmail_core::CustomerStatus;
use sqlx::PgPool;

use crate::models::customer::{CreateCustomer, Customer, StatusCount};

/// Column list for `customers` queries.
const COLUMNS: &str = "\
    id, email, company_name, ceo_name, status, sent_at, fail_reason, \
    claimed_at, created_at";

/// Provides queue and CRUD operations for recipients.
pub struct CustomerRepo;

impl CustomerRepo {
    /// Insert a new recipient in `ready`.
    pub async fn create(pool: &PgPool, input: &CreateCustomer) -> Result<Customer, sqlx::Error> {
        let query = format!(
            "INSERT INTO customers \
                 (email, company_name, ceo_name, memo, biz_type, phone, address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Customer>(&query)
            .bind(&input.email)
            .bind(&input.company_name)
            .bind(&input.ceo_name)
            .bind(&input.memo)
            .bind(&input.biz_type)
            .bind(&input.phone)
            .bind(&input.address)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Customer>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM customers WHERE id = $1");
        sqlx::query_as::<_, Customer>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Return one recipient currently in `status`, oldest first.
    ///
    /// This is a plain read: the row is not locked, so the caller must still
    /// win [`CustomerRepo::try_claim`] before acting on it.
    pub async fn next_with_status(
        pool: &PgPool,
        status: CustomerStatus,
    ) -> Result<Option<Customer>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM customers \
             WHERE status = $1 \
             ORDER BY id ASC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Customer>(&query)
            .bind(status.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Compare-and-swap a recipient from `expected` to `sending`.
    ///
    /// Returns `false` when the row no longer has the expected status (another
    /// worker or an operator got there first). A successful claim stamps
    /// `claimed_at` and clears any previous `fail_reason`.
    pub async fn try_claim(
        pool: &PgPool,
        id: DbId,
        expected: CustomerStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE customers \
             SET status = $2, claimed_at = NOW(), fail_reason = NULL \
             WHERE id = $1 AND status = $3",
        )
        .bind(id)
        .bind(CustomerStatus::Sending.as_str())
        .bind(expected.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record a successful send: `status = sent`, `sent_at = NOW()`.
    ///
    /// An `unsubscribed` status set while the send was in flight is kept;
    /// only `sent_at` is recorded in that case.
    pub async fn mark_sent(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE customers \
             SET status = CASE WHEN status = $3 THEN status ELSE $2 END, \
                 sent_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(CustomerStatus::Sent.as_str())
        .bind(CustomerStatus::Unsubscribed.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed send: `status = failed` with the transport's reason.
    ///
    /// Like [`CustomerRepo::mark_sent`], never overwrites `unsubscribed`. No
    /// automatic retry follows; the operator resets the row to `ready`.
    pub async fn mark_failed(pool: &PgPool, id: DbId, reason: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE customers \
             SET status = CASE WHEN status = $4 THEN status ELSE $2 END, \
                 fail_reason = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(CustomerStatus::Failed.as_str())
        .bind(reason)
        .bind(CustomerStatus::Unsubscribed.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Return recipients stuck in `sending` since before `cutoff` to `ready`.
    ///
    /// Returns the number of rows reset.
    pub async fn reclaim_stale(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE customers \
             SET status = $1, claimed_at = NULL \
             WHERE status = $2 AND claimed_at < $3",
        )
        .bind(CustomerStatus::Ready.as_str())
        .bind(CustomerStatus::Sending.as_str())
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Operator status change (force `dispatch`, reset `failed`/`sent` to `ready`).
    ///
    /// Refuses to touch `unsubscribed` rows. Returns `true` if a row changed.
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status: CustomerStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE customers \
             SET status = $2, fail_reason = NULL \
             WHERE id = $1 AND status <> $3",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(CustomerStatus::Unsubscribed.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the recipient with this address `unsubscribed`.
    ///
    /// Returns `false` if no recipient has that address.
    pub async fn unsubscribe_by_email(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE customers SET status = $2 WHERE email = $1")
            .bind(email)
            .bind(CustomerStatus::Unsubscribed.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Recipient totals per status, for dashboards and the startup log.
    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<StatusCount>, sqlx::Error> {
        sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM customers \
             GROUP BY status \
             ORDER BY status",
        )
        .fetch_all(pool)
        .await
    }
}
