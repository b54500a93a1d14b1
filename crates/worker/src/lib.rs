//! Campaign worker: drains the recipient queue one email at a time.
//!
//! - [`store`]: the seams the loop depends on ([`CandidateSource`],
//!   [`ClaimStore`], [`RunConfigSource`]) and the Postgres implementation.
//! - [`pipeline`]: render, transmit, reconcile one claimed recipient.
//! - [`dispatcher`]: the polling loop with the priority `dispatch` lane, the
//!   run/pause flag and send pacing.
//! - [`reaper`]: optional recovery of recipients stuck in `sending`.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod reaper;
pub mod store;

pub use config::WorkerConfig;
pub use dispatcher::{CycleOutcome, DispatchLoop, Lane};
pub use error::{StoreError, WorkerError};
pub use pipeline::{DeliveryOutcome, SendPipeline};
pub use reaper::StaleClaimReaper;
pub use store::{CandidateSource, ClaimStore, PgStore, RecipientStore, RunConfig, RunConfigSource};
