//! Recipient dispatch loop.
//!
//! Polls the shared store for one recipient at a time: the `dispatch` lane
//! first (regardless of the run flag), then the `ready` lane while the run
//! flag is on. A candidate is only worked after winning the compare-and-swap
//! claim via [`ClaimStore::try_claim`](crate::store::ClaimStore::try_claim),
//! which keeps concurrent worker processes from sending the same email twice.
//! Sends are strictly sequential and paced by a random delay.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use coldmail_core::types::DbId;
use coldmail_core::CustomerStatus;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::pipeline::{DeliveryOutcome, SendPipeline};
use crate::store::RecipientStore;

/// Which queue a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Operator-forced `dispatch` records.
    Priority,
    /// `ready` records, drained only while running.
    Normal,
}

impl Lane {
    fn of(status: CustomerStatus) -> Self {
        match status {
            CustomerStatus::Dispatch => Self::Priority,
            _ => Self::Normal,
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Priority => f.write_str("dispatch"),
            Self::Normal => f.write_str("ready"),
        }
    }
}

/// What a single cycle did. Determines the wait before the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The run configuration could not be read.
    ConfigUnavailable,
    /// No `dispatch` work and the run flag is off.
    Paused,
    /// Neither lane had a candidate.
    Idle,
    /// Another worker or the operator changed the candidate first.
    ClaimLost { customer_id: DbId },
    Delivered { customer_id: DbId, lane: Lane },
    Failed {
        customer_id: DbId,
        lane: Lane,
        reason: String,
    },
}

/// The worker's main loop.
pub struct DispatchLoop {
    store: Arc<dyn RecipientStore>,
    pipeline: SendPipeline,
    config: WorkerConfig,
}

impl DispatchLoop {
    pub fn new(
        store: Arc<dyn RecipientStore>,
        pipeline: SendPipeline,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            pipeline,
            config,
        }
    }

    /// Run cycles until the cancellation token is triggered.
    ///
    /// Errors never end the loop; they are logged and followed by
    /// `error_backoff`. Cancellation is only observed between cycles, so an
    /// in-flight send always completes and is reconciled first.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            idle_poll_ms = self.config.idle_poll.as_millis() as u64,
            pacing_min_ms = self.config.pacing_min.as_millis() as u64,
            pacing_max_ms = self.config.pacing_max.as_millis() as u64,
            "Dispatch loop started",
        );

        loop {
            let delay = match self.run_cycle().await {
                Ok(outcome) => self.delay_for(&outcome),
                Err(e) => {
                    tracing::error!(error = %e, "Dispatch cycle failed");
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Dispatch loop shutting down");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One cycle: read the switch, pick a candidate, claim it, send.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, WorkerError> {
        let run_config = match self.store.load_run_config().await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load run configuration");
                return Ok(CycleOutcome::ConfigUnavailable);
            }
        };

        let customer = match self.store.next_priority().await? {
            Some(customer) => customer,
            None if !run_config.is_running => {
                tracing::debug!("Paused, skipping ready lane");
                return Ok(CycleOutcome::Paused);
            }
            None => match self.store.next_normal().await? {
                Some(customer) => customer,
                None => {
                    tracing::debug!("No recipients waiting");
                    return Ok(CycleOutcome::Idle);
                }
            },
        };
        let lane = Lane::of(customer.status);

        if !self.store.try_claim(customer.id, customer.status).await? {
            tracing::debug!(
                customer_id = customer.id,
                %lane,
                "Claim lost to another worker",
            );
            return Ok(CycleOutcome::ClaimLost {
                customer_id: customer.id,
            });
        }

        tracing::info!(
            customer_id = customer.id,
            email = %customer.email,
            company = customer.company_name.as_deref().unwrap_or_default(),
            %lane,
            "Recipient claimed",
        );

        let outcome = self
            .pipeline
            .deliver(self.store.as_ref(), &customer, &run_config)
            .await?;

        Ok(match outcome {
            DeliveryOutcome::Sent => CycleOutcome::Delivered {
                customer_id: customer.id,
                lane,
            },
            DeliveryOutcome::Failed { reason } => CycleOutcome::Failed {
                customer_id: customer.id,
                lane,
                reason,
            },
        })
    }

    /// The wait that follows a cycle with this outcome.
    pub fn delay_for(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::ConfigUnavailable => self.config.error_backoff,
            CycleOutcome::Paused => self.config.paused_poll,
            CycleOutcome::Idle => self.config.idle_poll,
            CycleOutcome::ClaimLost { .. } => self.config.claim_backoff,
            CycleOutcome::Delivered { .. } | CycleOutcome::Failed { .. } => {
                let delay = self.pacing_delay();
                tracing::debug!(delay_ms = delay.as_millis() as u64, "Pacing before next send");
                delay
            }
        }
    }

    /// Uniformly random delay in `[pacing_min, pacing_max]`.
    pub fn pacing_delay(&self) -> Duration {
        let min = self.config.pacing_min.as_millis() as u64;
        let max = self.config.pacing_max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}
