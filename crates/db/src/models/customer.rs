//! Recipient rows from the `customers` table.

use coldmail_core::template::Recipient;
use coldmail_core::types::{DbId, Timestamp};
use coldmail_core::CustomerStatus;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `customers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Customer {
    pub id: DbId,
    pub email: String,
    pub company_name: Option<String>,
    pub ceo_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: CustomerStatus,
    pub sent_at: Option<Timestamp>,
    pub fail_reason: Option<String>,
    /// Set when a worker claims the row; drives stale-claim recovery.
    pub claimed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Customer {
    /// The fields a template may reference.
    pub fn recipient(&self) -> Recipient<'_> {
        Recipient {
            email: &self.email,
            company_name: self.company_name.as_deref(),
            ceo_name: self.ceo_name.as_deref(),
        }
    }
}

/// DTO for inserting a new recipient.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCustomer {
    pub email: String,
    pub company_name: Option<String>,
    pub ceo_name: Option<String>,
    pub memo: Option<String>,
    pub biz_type: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Number of recipients currently in one status.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    #[sqlx(try_from = "String")]
    pub status: CustomerStatus,
    pub count: i64,
}
