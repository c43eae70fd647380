// Worker Configuration
//
// Parsed from environment-style keys; malformed values are fatal at startup.

use crate::error::{AppError, Result};
use std::time::Duration;

pub const ENV_WORKER_ID: &str = "JOB_WORKER_ID";
pub const ENV_CONCURRENCY: &str = "JOB_WORKER_CONCURRENCY";
pub const ENV_POLL_INTERVAL_MS: &str = "JOB_WORKER_POLL_INTERVAL_MS";
pub const ENV_STUCK_JOB_TIMEOUT_MS: &str = "JOB_WORKER_STUCK_JOB_TIMEOUT_MS";
pub const ENV_RECLAIM_INTERVAL_MS: &str = "JOB_WORKER_RECLAIM_INTERVAL_MS";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "JOB_WORKER_RETRY_BASE_DELAY_MS";
pub const ENV_RETRY_MAX_DELAY_MS: &str = "JOB_WORKER_RETRY_MAX_DELAY_MS";

pub const DEFAULT_WORKER_ID: &str = "analysis-worker-1";
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_STUCK_JOB_TIMEOUT_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_RECLAIM_INTERVAL_MS: u64 = 60 * 1000;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 60 * 1000;

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    pub stuck_job_timeout_ms: u64,
    pub reclaim_interval_ms: u64,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: DEFAULT_WORKER_ID.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            stuck_job_timeout_ms: DEFAULT_STUCK_JOB_TIMEOUT_MS,
            reclaim_interval_ms: DEFAULT_RECLAIM_INTERVAL_MS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Missing keys fall back to defaults; present but malformed keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            worker_id: lookup(ENV_WORKER_ID)
                .map(|s| s.trim().to_string())
                .unwrap_or(defaults.worker_id),
            concurrency: parse_or(&lookup, ENV_CONCURRENCY, defaults.concurrency)?,
            poll_interval_ms: parse_or(&lookup, ENV_POLL_INTERVAL_MS, defaults.poll_interval_ms)?,
            stuck_job_timeout_ms: parse_or(
                &lookup,
                ENV_STUCK_JOB_TIMEOUT_MS,
                defaults.stuck_job_timeout_ms,
            )?,
            reclaim_interval_ms: parse_or(
                &lookup,
                ENV_RECLAIM_INTERVAL_MS,
                defaults.reclaim_interval_ms,
            )?,
            retry_base_delay_ms: parse_or(
                &lookup,
                ENV_RETRY_BASE_DELAY_MS,
                defaults.retry_base_delay_ms,
            )?,
            retry_max_delay_ms: parse_or(
                &lookup,
                ENV_RETRY_MAX_DELAY_MS,
                defaults.retry_max_delay_ms,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the worker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.worker_id.is_empty() {
            return Err(AppError::Config("worker_id must not be empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(AppError::Config("concurrency must be at least 1".to_string()));
        }
        for (name, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("stuck_job_timeout_ms", self.stuck_job_timeout_ms),
            ("reclaim_interval_ms", self.reclaim_interval_ms),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("{} must be positive", name)));
            }
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(AppError::Config(format!(
                "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reclaim_interval(&self) -> Duration {
        Duration::from_millis(self.reclaim_interval_ms)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has invalid value '{}'", key, raw))),
    }
}
