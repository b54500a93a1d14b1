//! Shared test doubles for the worker integration tests.
//!
//! - [`MemoryStore`]: an in-memory recipient table and run configuration
//!   implementing the store seams, with switches to simulate outages and
//!   claim races.
//! - [`ScriptedMailer`]: records every email and fails on demand.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use coldmail_core::types::{DbId, Timestamp};
use coldmail_core::CustomerStatus;
use coldmail_db::models::customer::Customer;
use coldmail_delivery::{MailError, Mailer, OutgoingEmail};
use coldmail_worker::{
    CandidateSource, ClaimStore, RunConfig, RunConfigSource, SendPipeline, StoreError, WorkerConfig,
};
use tokio::sync::Mutex;

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct State {
    customers: Vec<Customer>,
    run: RunConfig,
    next_id: DbId,
    fail_config_reads: bool,
    fail_candidate_reads: bool,
    fail_outcome_writes: bool,
    race_next_claim: bool,
    config_reads: usize,
    normal_queries: usize,
}

/// In-memory stand-in for the `customers` / `app_config` tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipient with the given status. Returns its id.
    pub async fn insert(&self, email: &str, status: CustomerStatus) -> DbId {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = state.next_id;
        state.customers.push(Customer {
            id,
            email: email.to_string(),
            company_name: Some("Acme".to_string()),
            ceo_name: None,
            status,
            sent_at: None,
            fail_reason: None,
            claimed_at: None,
            created_at: Utc::now(),
        });
        id
    }

    pub async fn get(&self, id: DbId) -> Customer {
        self.state
            .lock()
            .await
            .customers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .expect("customer exists")
    }

    pub async fn set_running(&self, is_running: bool) {
        self.state.lock().await.run.is_running = is_running;
    }

    pub async fn set_template(&self, subject: &str, template: &str) {
        let mut state = self.state.lock().await;
        state.run.email_subject = Some(subject.to_string());
        state.run.email_template = Some(template.to_string());
    }

    /// Operator/unsubscribe action: change a status out from under the worker.
    pub async fn set_status(&self, id: DbId, status: CustomerStatus) {
        let mut state = self.state.lock().await;
        if let Some(c) = state.customers.iter_mut().find(|c| c.id == id) {
            c.status = status;
        }
    }

    /// Pretend the recipient was claimed `claimed_at`.
    pub async fn set_claimed_at(&self, id: DbId, claimed_at: Timestamp) {
        let mut state = self.state.lock().await;
        if let Some(c) = state.customers.iter_mut().find(|c| c.id == id) {
            c.claimed_at = Some(claimed_at);
        }
    }

    pub async fn fail_config_reads(&self, fail: bool) {
        self.state.lock().await.fail_config_reads = fail;
    }

    pub async fn fail_candidate_reads(&self, fail: bool) {
        self.state.lock().await.fail_candidate_reads = fail;
    }

    pub async fn fail_outcome_writes(&self, fail: bool) {
        self.state.lock().await.fail_outcome_writes = fail;
    }

    /// Make the next claim lose: another worker claims the row first.
    pub async fn race_next_claim(&self) {
        self.state.lock().await.race_next_claim = true;
    }

    pub async fn config_reads(&self) -> usize {
        self.state.lock().await.config_reads
    }

    pub async fn normal_queries(&self) -> usize {
        self.state.lock().await.normal_queries
    }

    async fn first_with_status(
        &self,
        status: CustomerStatus,
    ) -> Result<Option<Customer>, StoreError> {
        let state = self.state.lock().await;
        if state.fail_candidate_reads {
            return Err(StoreError::Unavailable("candidate query failed".to_string()));
        }
        Ok(state.customers.iter().find(|c| c.status == status).cloned())
    }

    /// Apply an outcome write, keeping `unsubscribed` like the SQL does.
    async fn write_outcome(
        &self,
        id: DbId,
        apply: impl FnOnce(&mut Customer) + Send,
        status: CustomerStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.fail_outcome_writes {
            return Err(StoreError::Unavailable("outcome write failed".to_string()));
        }
        if let Some(c) = state.customers.iter_mut().find(|c| c.id == id) {
            apply(c);
            if c.status != CustomerStatus::Unsubscribed {
                c.status = status;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CandidateSource for MemoryStore {
    async fn next_priority(&self) -> Result<Option<Customer>, StoreError> {
        self.first_with_status(CustomerStatus::Dispatch).await
    }

    async fn next_normal(&self) -> Result<Option<Customer>, StoreError> {
        self.state.lock().await.normal_queries += 1;
        self.first_with_status(CustomerStatus::Ready).await
    }
}

#[async_trait]
impl ClaimStore for MemoryStore {
    async fn try_claim(&self, id: DbId, expected: CustomerStatus) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let race = std::mem::take(&mut state.race_next_claim);
        let Some(c) = state.customers.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };
        if race {
            c.status = CustomerStatus::Sending;
            c.claimed_at = Some(Utc::now());
        }
        if c.status != expected {
            return Ok(false);
        }
        c.status = CustomerStatus::Sending;
        c.claimed_at = Some(Utc::now());
        c.fail_reason = None;
        Ok(true)
    }

    async fn mark_sent(&self, id: DbId) -> Result<(), StoreError> {
        self.write_outcome(id, |c| c.sent_at = Some(Utc::now()), CustomerStatus::Sent)
            .await
    }

    async fn mark_failed(&self, id: DbId, reason: &str) -> Result<(), StoreError> {
        let reason = reason.to_string();
        self.write_outcome(id, |c| c.fail_reason = Some(reason), CustomerStatus::Failed)
            .await
    }

    async fn reclaim_stale(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let mut reset = 0;
        for c in state.customers.iter_mut() {
            if c.status == CustomerStatus::Sending && c.claimed_at.is_some_and(|at| at < cutoff) {
                c.status = CustomerStatus::Ready;
                c.claimed_at = None;
                reset += 1;
            }
        }
        Ok(reset)
    }
}

#[async_trait]
impl RunConfigSource for MemoryStore {
    async fn load_run_config(&self) -> Result<RunConfig, StoreError> {
        let mut state = self.state.lock().await;
        state.config_reads += 1;
        if state.fail_config_reads {
            return Err(StoreError::Unavailable("app_config unreachable".to_string()));
        }
        Ok(state.run.clone())
    }
}

// ---------------------------------------------------------------------------
// ScriptedMailer
// ---------------------------------------------------------------------------

/// Mailer that records sends and replays queued failures.
#[derive(Default)]
pub struct ScriptedMailer {
    sent: StdMutex<Vec<OutgoingEmail>>,
    failures: StdMutex<VecDeque<String>>,
    always_fail: Option<String>,
}

impl ScriptedMailer {
    /// A mailer whose every send is rejected with `reason`.
    pub fn failing(reason: &str) -> Self {
        Self {
            always_fail: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Reject the next send with `reason`.
    pub fn fail_next(&self, reason: &str) {
        self.failures.lock().unwrap().push_back(reason.to_string());
    }

    /// Every email accepted so far.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for ScriptedMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let scripted = self.failures.lock().unwrap().pop_front();
        if let Some(reason) = scripted.or_else(|| self.always_fail.clone()) {
            return Err(MailError::Build(reason));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn pipeline(mailer: &Arc<ScriptedMailer>) -> SendPipeline {
    SendPipeline::new(Arc::clone(mailer) as Arc<dyn Mailer>)
}

/// Production timings: these tests assert on them.
pub fn config() -> WorkerConfig {
    WorkerConfig::default()
}
