use std::str::FromStr;
use std::time::Duration;

use crate::error::WorkerError;

/// Worker timing and recovery settings loaded from environment variables.
///
/// The defaults match the production pacing: 10s idle/paused/error polls, a
/// 2s retry after a lost claim and 5-10s between sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Wait after a cycle that found no candidate in either lane.
    pub idle_poll: Duration,
    /// Wait after a cycle that found the run flag off and no `dispatch` work.
    pub paused_poll: Duration,
    /// Wait after a failed cycle (store unreachable, reconciliation failed).
    pub error_backoff: Duration,
    /// Wait after losing a claim race.
    pub claim_backoff: Duration,
    /// Lower bound of the randomized post-send delay.
    pub pacing_min: Duration,
    /// Upper bound (inclusive) of the randomized post-send delay.
    pub pacing_max: Duration,
    /// Reset `sending` rows claimed longer ago than this. `None` disables
    /// the reaper.
    pub stale_sending_after: Option<Duration>,
    /// How often the reaper scans for stale claims.
    pub reap_interval: Duration,
    /// Apply the bundled schema migrations at startup.
    pub run_migrations: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_secs(10),
            paused_poll: Duration::from_secs(10),
            error_backoff: Duration::from_secs(10),
            claim_backoff: Duration::from_secs(2),
            pacing_min: Duration::from_millis(5_000),
            pacing_max: Duration::from_millis(10_000),
            stale_sending_after: None,
            reap_interval: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default  |
    /// |------------------------------|----------|
    /// | `WORKER_IDLE_POLL_SECS`      | `10`     |
    /// | `WORKER_PAUSED_POLL_SECS`    | `10`     |
    /// | `WORKER_ERROR_BACKOFF_SECS`  | `10`     |
    /// | `WORKER_CLAIM_BACKOFF_SECS`  | `2`      |
    /// | `WORKER_PACING_MIN_MS`       | `5000`   |
    /// | `WORKER_PACING_MAX_MS`       | `10000`  |
    /// | `WORKER_STALE_SENDING_MINS`  | disabled |
    /// | `WORKER_REAP_INTERVAL_SECS`  | `60`     |
    /// | `WORKER_RUN_MIGRATIONS`      | `true`   |
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, WorkerError> {
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| -> Result<Duration, WorkerError> {
            Ok(parse_var::<u64>(&get, key)?.map_or(default, Duration::from_secs))
        };
        let millis = |key: &str, default: Duration| -> Result<Duration, WorkerError> {
            Ok(parse_var::<u64>(&get, key)?.map_or(default, Duration::from_millis))
        };

        let config = Self {
            idle_poll: secs("WORKER_IDLE_POLL_SECS", defaults.idle_poll)?,
            paused_poll: secs("WORKER_PAUSED_POLL_SECS", defaults.paused_poll)?,
            error_backoff: secs("WORKER_ERROR_BACKOFF_SECS", defaults.error_backoff)?,
            claim_backoff: secs("WORKER_CLAIM_BACKOFF_SECS", defaults.claim_backoff)?,
            pacing_min: millis("WORKER_PACING_MIN_MS", defaults.pacing_min)?,
            pacing_max: millis("WORKER_PACING_MAX_MS", defaults.pacing_max)?,
            stale_sending_after: parse_var::<u64>(&get, "WORKER_STALE_SENDING_MINS")?
                .filter(|mins| *mins > 0)
                .map(|mins| Duration::from_secs(mins * 60)),
            reap_interval: secs("WORKER_REAP_INTERVAL_SECS", defaults.reap_interval)?,
            run_migrations: parse_var::<bool>(&get, "WORKER_RUN_MIGRATIONS")?
                .unwrap_or(defaults.run_migrations),
        };

        if config.pacing_min > config.pacing_max {
            return Err(WorkerError::Config(format!(
                "WORKER_PACING_MIN_MS ({}) exceeds WORKER_PACING_MAX_MS ({})",
                config.pacing_min.as_millis(),
                config.pacing_max.as_millis()
            )));
        }
        if config.reap_interval.is_zero() {
            return Err(WorkerError::Config(
                "WORKER_REAP_INTERVAL_SECS must be positive".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, WorkerError> {
    match get(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| WorkerError::Config(format!("{key} has invalid value '{raw}'"))),
    }
}
