// Job Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Priority (lower number = serviced first)
pub type Priority = i32;

/// Job lifecycle status
///
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Job kind, selects which processor handles the job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKind(String);

impl JobKind {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job input (opaque JSON, interpreted only by the processor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInput(serde_json::Value);

impl JobInput {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Default ceiling on execution attempts
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner: String,
    pub kind: JobKind,
    pub input: JobInput,

    pub status: JobStatus,
    pub priority: Priority,

    pub attempts: i32,
    pub max_attempts: i32,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,

    pub worker_id: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub processing_time_ms: Option<i64>,
}

impl Job {
    /// Create a new pending Job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `owner` - Requesting actor
    /// * `kind` - Processor selector
    /// * `input` - Opaque payload
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        owner: impl Into<String>,
        kind: JobKind,
        input: JobInput,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            kind,
            input,
            status: JobStatus::Pending,
            priority: 0,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            created_at,
            started_at: None,
            completed_at: None,
            worker_id: None,
            result: None,
            error: None,
            processing_time_ms: None,
        }
    }

    /// Create a test job with deterministic ID and timestamp.
    ///
    /// IDs are `test-1`, `test-2`, ... and timestamps increase by 1000 per call,
    /// so creation order is preserved across tests in one process.
    pub fn new_test(kind: impl Into<String>, input: serde_json::Value) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let id = format!("test-{}", counter);
        let created_at = (counter * 1000) as i64;

        Self::new(
            id,
            created_at,
            "test-owner",
            JobKind::new(kind),
            JobInput::new(input),
        )
    }

    /// Builder-style priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder-style attempt ceiling
    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Processing and started strictly before `cutoff`
    pub fn is_stuck(&self, cutoff: i64) -> bool {
        self.status == JobStatus::Processing && self.started_at.is_some_and(|t| t < cutoff)
    }

    fn expect_status(&self, expected: JobStatus, to: JobStatus) -> Result<()> {
        if self.status != expected {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    fn check_attempts(&self, attempts: i32) -> Result<()> {
        if attempts > self.max_attempts || attempts < self.attempts {
            return Err(DomainError::AttemptsExhausted {
                attempts,
                max_attempts: self.max_attempts,
            });
        }
        Ok(())
    }

    /// Claim: Pending -> Processing
    pub fn start(&mut self, worker_id: impl Into<String>, now_millis: i64) -> Result<()> {
        self.expect_status(JobStatus::Pending, JobStatus::Processing)?;
        self.status = JobStatus::Processing;
        self.started_at = Some(now_millis);
        self.worker_id = Some(worker_id.into());
        Ok(())
    }

    /// Processing -> Completed
    pub fn complete(
        &mut self,
        attempts: i32,
        result: serde_json::Value,
        processing_time_ms: i64,
        now_millis: i64,
    ) -> Result<()> {
        self.expect_status(JobStatus::Processing, JobStatus::Completed)?;
        self.check_attempts(attempts)?;
        self.status = JobStatus::Completed;
        self.attempts = attempts;
        self.result = Some(result);
        self.processing_time_ms = Some(processing_time_ms);
        self.completed_at = Some(now_millis);
        Ok(())
    }

    /// Processing -> Pending (retryable failure)
    pub fn requeue(&mut self, attempts: i32, note: impl Into<String>) -> Result<()> {
        self.expect_status(JobStatus::Processing, JobStatus::Pending)?;
        self.check_attempts(attempts)?;
        if attempts >= self.max_attempts {
            return Err(DomainError::AttemptsExhausted {
                attempts,
                max_attempts: self.max_attempts,
            });
        }
        self.status = JobStatus::Pending;
        self.attempts = attempts;
        self.error = Some(note.into());
        Ok(())
    }

    /// Processing -> Failed (terminal)
    pub fn fail(&mut self, attempts: i32, error: impl Into<String>, now_millis: i64) -> Result<()> {
        self.expect_status(JobStatus::Processing, JobStatus::Failed)?;
        self.check_attempts(attempts)?;
        self.status = JobStatus::Failed;
        self.attempts = attempts;
        self.error = Some(error.into());
        self.completed_at = Some(now_millis);
        Ok(())
    }
}
