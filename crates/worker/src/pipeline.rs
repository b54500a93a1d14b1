//! Send pipeline: render, transmit and reconcile one claimed recipient.
//!
//! Transport failures are an expected outcome and are recorded on the row as
//! `failed`. Only a failure to write that outcome back to the store is
//! returned as an error.

use std::sync::Arc;

use coldmail_core::template;
use coldmail_db::models::customer::Customer;
use coldmail_delivery::{Mailer, OutgoingEmail};

use crate::error::StoreError;
use crate::store::{ClaimStore, RunConfig};

/// How a single send attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed { reason: String },
}

/// Renders and sends one email per claimed recipient.
pub struct SendPipeline {
    mailer: Arc<dyn Mailer>,
}

impl SendPipeline {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Build the message for `customer` from the current run configuration.
    pub fn compose(customer: &Customer, run_config: &RunConfig) -> OutgoingEmail {
        let rendered = template::render(
            run_config.email_subject.as_deref(),
            run_config.email_template.as_deref(),
            &customer.recipient(),
        );

        if !rendered.unresolved_placeholders.is_empty() {
            tracing::debug!(
                customer_id = customer.id,
                placeholders = ?rendered.unresolved_placeholders,
                "Template contains unknown placeholders, left as-is",
            );
        }

        OutgoingEmail {
            to: customer.email.clone(),
            subject: rendered.subject,
            html: rendered.html,
        }
    }

    /// Send to a recipient this worker has claimed and record the result.
    ///
    /// The outcome write is unconditional: the `sending` claim already gives
    /// this worker exclusive ownership of the row.
    pub async fn deliver<S>(
        &self,
        store: &S,
        customer: &Customer,
        run_config: &RunConfig,
    ) -> Result<DeliveryOutcome, StoreError>
    where
        S: ClaimStore + ?Sized,
    {
        let email = Self::compose(customer, run_config);

        match self.mailer.send(&email).await {
            Ok(()) => {
                store.mark_sent(customer.id).await?;
                tracing::info!(
                    customer_id = customer.id,
                    email = %customer.email,
                    "Delivered",
                );
                Ok(DeliveryOutcome::Sent)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(
                    customer_id = customer.id,
                    email = %customer.email,
                    error = %reason,
                    "Delivery failed",
                );
                store.mark_failed(customer.id, &reason).await?;
                Ok(DeliveryOutcome::Failed { reason })
            }
        }
    }
}
