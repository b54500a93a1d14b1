//! Recipient lifecycle status.
//!
//! Stored as lowercase TEXT in `customers.status`. The worker only ever moves
//! a record `ready`/`dispatch` -> `sending` -> `sent`/`failed`; every other
//! transition belongs to the operator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    /// Waiting in the normal lane; only picked up while the run flag is on.
    Ready,
    /// Operator-forced immediate send; picked up even while paused.
    Dispatch,
    /// Claimed by a worker, send in flight.
    Sending,
    Sent,
    Failed,
    Unsubscribed,
}

impl CustomerStatus {
    pub const ALL: [CustomerStatus; 6] = [
        Self::Ready,
        Self::Dispatch,
        Self::Sending,
        Self::Sent,
        Self::Failed,
        Self::Unsubscribed,
    ];

    /// Database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Dispatch => "dispatch",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Unsubscribed => "unsubscribed",
        }
    }

    /// Whether a record in this status may be claimed by a worker.
    pub fn is_candidate(self) -> bool {
        matches!(self, Self::Ready | Self::Dispatch)
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown customer status '{s}'")))
    }
}

impl TryFrom<String> for CustomerStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
