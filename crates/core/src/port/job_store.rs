// Job Store Port (Interface)

use crate::domain::{Job, JobId, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Terminal success write
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub attempts: i32,
    pub result: serde_json::Value,
    pub processing_time_ms: i64,
    pub completed_at: i64,
}

/// Failure write: either a re-queue (`Pending`) or a terminal `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureUpdate {
    pub attempts: i32,
    pub status: JobStatus,
    pub error: String,
    pub completed_at: Option<i64>,
}

/// Persistence interface consumed by the worker
///
/// Every write that moves a job out of `processing` is conditional on the row
/// still being `processing`; the returned bool reports whether the row matched.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Pending jobs ordered by (priority ASC, created_at ASC), at most `limit`
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Job>>;

    /// Atomically move a job from pending to processing.
    /// Returns false if the job is no longer pending (claimed elsewhere).
    async fn claim(&self, id: &JobId, worker_id: &str, started_at: i64) -> Result<bool>;

    /// Mark a processing job completed
    async fn complete(&self, id: &JobId, completion: &Completion) -> Result<bool>;

    /// Re-queue or terminally fail a processing job
    async fn fail_or_retry(&self, id: &JobId, update: &FailureUpdate) -> Result<bool>;

    /// Processing jobs with started_at < cutoff
    async fn find_stuck(&self, cutoff: i64) -> Result<Vec<Job>>;

    /// Force a stuck job to failed (only while still processing and older than cutoff)
    async fn force_fail(
        &self,
        id: &JobId,
        error: &str,
        completed_at: i64,
        cutoff: i64,
    ) -> Result<bool>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory JobStore with the same conditional-update semantics as SQL
    #[derive(Default)]
    pub struct InMemoryJobStore {
        jobs: Mutex<HashMap<JobId, Job>>,
        fail_reads: AtomicBool,
        failing_writes: AtomicUsize,
    }

    impl InMemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every fetch/scan fail until reset
        pub fn set_unreachable(&self, unreachable: bool) {
            self.fail_reads.store(unreachable, Ordering::SeqCst);
        }

        /// Make the next `n` terminal writes fail
        pub fn fail_next_writes(&self, n: usize) {
            self.failing_writes.store(n, Ordering::SeqCst);
        }

        /// Overwrite a row directly (test setup)
        pub fn put(&self, job: Job) {
            self.lock().insert(job.id.clone(), job);
        }

        pub fn get(&self, id: &str) -> Option<Job> {
            self.lock().get(id).cloned()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, Job>> {
            self.jobs.lock().unwrap_or_else(|e| e.into_inner())
        }

        fn check_read(&self) -> Result<()> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(AppError::Database("store unreachable".to_string()));
            }
            Ok(())
        }

        fn check_write(&self) -> Result<()> {
            let remaining = self
                .failing_writes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if remaining.is_ok() {
                return Err(AppError::Database("write failed".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn insert(&self, job: &Job) -> Result<()> {
            let mut jobs = self.lock();
            if jobs.contains_key(&job.id) {
                return Err(AppError::Database(format!(
                    "Unique constraint violation: {}",
                    job.id
                )));
            }
            jobs.insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
            Ok(self.get(id))
        }

        async fn fetch_pending(&self, limit: usize) -> Result<Vec<Job>> {
            self.check_read()?;
            let mut pending: Vec<Job> = self
                .lock()
                .values()
                .filter(|j| j.status == JobStatus::Pending)
                .cloned()
                .collect();
            pending.sort_by(|a, b| {
                (a.priority, a.created_at, &a.id).cmp(&(b.priority, b.created_at, &b.id))
            });
            pending.truncate(limit);
            Ok(pending)
        }

        async fn claim(&self, id: &JobId, worker_id: &str, started_at: i64) -> Result<bool> {
            let mut jobs = self.lock();
            match jobs.get_mut(id) {
                Some(job) => Ok(job.start(worker_id, started_at).is_ok()),
                None => Ok(false),
            }
        }

        async fn complete(&self, id: &JobId, completion: &Completion) -> Result<bool> {
            self.check_write()?;
            let mut jobs = self.lock();
            match jobs.get_mut(id) {
                Some(job) => Ok(job
                    .complete(
                        completion.attempts,
                        completion.result.clone(),
                        completion.processing_time_ms,
                        completion.completed_at,
                    )
                    .is_ok()),
                None => Ok(false),
            }
        }

        async fn fail_or_retry(&self, id: &JobId, update: &FailureUpdate) -> Result<bool> {
            self.check_write()?;
            let mut jobs = self.lock();
            let Some(job) = jobs.get_mut(id) else {
                return Ok(false);
            };
            let applied = match update.status {
                JobStatus::Pending => job.requeue(update.attempts, update.error.clone()),
                _ => job.fail(
                    update.attempts,
                    update.error.clone(),
                    update.completed_at.unwrap_or_default(),
                ),
            };
            Ok(applied.is_ok())
        }

        async fn find_stuck(&self, cutoff: i64) -> Result<Vec<Job>> {
            self.check_read()?;
            Ok(self
                .lock()
                .values()
                .filter(|j| j.is_stuck(cutoff))
                .cloned()
                .collect())
        }

        async fn force_fail(
            &self,
            id: &JobId,
            error: &str,
            completed_at: i64,
            cutoff: i64,
        ) -> Result<bool> {
            let mut jobs = self.lock();
            match jobs.get_mut(id) {
                Some(job) if job.is_stuck(cutoff) => {
                    let attempts = job.attempts;
                    Ok(job.fail(attempts, error, completed_at).is_ok())
                }
                _ => Ok(false),
            }
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            Ok(self.lock().values().filter(|j| j.status == status).count() as i64)
        }
    }
}
