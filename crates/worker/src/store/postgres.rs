//! Postgres-backed store over the shared `customers` / `app_config` tables.

use async_trait::async_trait;
use coldmail_core::types::{DbId, Timestamp};
use coldmail_core::{CoreError, CustomerStatus};
use coldmail_db::models::app_config::APP_CONFIG_ID;
use coldmail_db::models::customer::Customer;
use coldmail_db::repositories::{AppConfigRepo, CustomerRepo};
use coldmail_db::DbPool;

use super::{CandidateSource, ClaimStore, RunConfig, RunConfigSource};
use crate::error::StoreError;

/// Adapts the repositories to the dispatch loop's store seams.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandidateSource for PgStore {
    async fn next_priority(&self) -> Result<Option<Customer>, StoreError> {
        Ok(CustomerRepo::next_with_status(&self.pool, CustomerStatus::Dispatch).await?)
    }

    async fn next_normal(&self) -> Result<Option<Customer>, StoreError> {
        Ok(CustomerRepo::next_with_status(&self.pool, CustomerStatus::Ready).await?)
    }
}

#[async_trait]
impl ClaimStore for PgStore {
    async fn try_claim(&self, id: DbId, expected: CustomerStatus) -> Result<bool, StoreError> {
        Ok(CustomerRepo::try_claim(&self.pool, id, expected).await?)
    }

    async fn mark_sent(&self, id: DbId) -> Result<(), StoreError> {
        Ok(CustomerRepo::mark_sent(&self.pool, id).await?)
    }

    async fn mark_failed(&self, id: DbId, reason: &str) -> Result<(), StoreError> {
        Ok(CustomerRepo::mark_failed(&self.pool, id, reason).await?)
    }

    async fn reclaim_stale(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        Ok(CustomerRepo::reclaim_stale(&self.pool, cutoff).await?)
    }
}

#[async_trait]
impl RunConfigSource for PgStore {
    async fn load_run_config(&self) -> Result<RunConfig, StoreError> {
        let config = AppConfigRepo::get(&self.pool)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "app_config",
                id: DbId::from(APP_CONFIG_ID),
            })?;
        Ok(config.into())
    }
}
