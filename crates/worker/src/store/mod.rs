//! Store seams for the dispatch loop.
//!
//! The loop never talks to Postgres directly. It selects work through
//! [`CandidateSource`], takes ownership through [`ClaimStore::try_claim`] and
//! reads the operator switch through [`RunConfigSource`]. [`PgStore`] backs
//! all three with the `customers` and `app_config` tables; a push-based queue
//! could replace the candidate source without touching claim or send logic.

use async_trait::async_trait;
use coldmail_core::types::{DbId, Timestamp};
use coldmail_core::CustomerStatus;
use coldmail_db::models::app_config::AppConfig;
use coldmail_db::models::customer::Customer;

use crate::error::StoreError;

pub mod postgres;

pub use postgres::PgStore;

/// Operator-controlled settings, read fresh every cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Whether the `ready` lane is drained.
    pub is_running: bool,
    pub email_subject: Option<String>,
    pub email_template: Option<String>,
}

impl From<AppConfig> for RunConfig {
    fn from(config: AppConfig) -> Self {
        Self {
            is_running: config.is_running,
            email_subject: config.email_subject,
            email_template: config.email_template,
        }
    }
}

/// Where the loop looks for its next recipient.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// One recipient in `dispatch` (operator-forced, ignores the run flag).
    async fn next_priority(&self) -> Result<Option<Customer>, StoreError>;

    /// One recipient in `ready`.
    async fn next_normal(&self) -> Result<Option<Customer>, StoreError>;
}

/// Ownership and outcome writes for a single recipient.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Move `id` to `sending` only if its status is still `expected`.
    ///
    /// `Ok(false)` means someone else changed the row first; it is not an
    /// error.
    async fn try_claim(&self, id: DbId, expected: CustomerStatus) -> Result<bool, StoreError>;

    /// Record a successful send (`sent`, `sent_at = now`).
    async fn mark_sent(&self, id: DbId) -> Result<(), StoreError>;

    /// Record a failed send (`failed`, `fail_reason = reason`).
    async fn mark_failed(&self, id: DbId, reason: &str) -> Result<(), StoreError>;

    /// Return `sending` rows claimed before `cutoff` to `ready`.
    async fn reclaim_stale(&self, cutoff: Timestamp) -> Result<u64, StoreError>;
}

/// Access to the run/pause flag and template.
#[async_trait]
pub trait RunConfigSource: Send + Sync {
    async fn load_run_config(&self) -> Result<RunConfig, StoreError>;
}

/// Everything the dispatch loop needs from one backend.
pub trait RecipientStore: CandidateSource + ClaimStore + RunConfigSource {}

impl<T> RecipientStore for T where T: CandidateSource + ClaimStore + RunConfigSource + ?Sized {}
