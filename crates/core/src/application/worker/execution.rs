// Job Execution Path - one attempt of one claimed job

use super::concurrency::AdmissionGuard;
use super::constants::{FINALIZE_MAX_ATTEMPTS, FINALIZE_RETRY_DELAY};
use super::panic_guard::run_isolated;
use super::shutdown::ShutdownToken;
use crate::application::retry::RetryPolicy;
use crate::domain::{Job, JobStatus};
use crate::error::Result;
use crate::port::{Completion, JobContext, JobMetrics, JobProcessor, JobStore, TimeProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Runs claimed jobs to their next persisted state
pub struct JobRunner {
    worker_id: String,
    store: Arc<dyn JobStore>,
    processor: Arc<dyn JobProcessor>,
    retry_policy: Arc<RetryPolicy>,
    metrics: Arc<dyn JobMetrics>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobRunner {
    pub fn new(
        worker_id: impl Into<String>,
        store: Arc<dyn JobStore>,
        processor: Arc<dyn JobProcessor>,
        retry_policy: Arc<RetryPolicy>,
        metrics: Arc<dyn JobMetrics>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            store,
            processor,
            retry_policy,
            metrics,
            time_provider,
        }
    }

    /// Execute a job that has already been claimed for this worker.
    ///
    /// The admission guard is held until the job is persisted and any retry
    /// backoff has elapsed; it is released on every exit path by `Drop`.
    pub async fn run(&self, job: Job, guard: AdmissionGuard, mut shutdown: ShutdownToken) {
        info!(job_id = %job.id, kind = %job.kind, attempt = job.attempts + 1, "Processing job");

        let ctx = JobContext::new(self.worker_id.clone(), job.attempts + 1, shutdown.clone());
        let started = Instant::now();

        let processor = Arc::clone(&self.processor);
        let job_for_exec = job.clone();
        let outcome =
            run_isolated(async move { processor.process(&job_for_exec, &ctx).await }).await;

        let duration_ms = started.elapsed().as_millis() as i64;
        self.metrics.record_duration(&job.kind, duration_ms);

        match outcome {
            Ok(result) => self.on_success(&job, result, duration_ms).await,
            Err(e) => {
                if let Some(backoff) = self.on_failure(&job, &e.to_string()).await {
                    // Slot stays reserved so this worker does not re-dispatch early
                    if shutdown.sleep_or_shutdown(backoff).await {
                        info!(job_id = %job.id, "Retry backoff cut short by shutdown");
                    }
                }
            }
        }

        drop(guard);
    }

    async fn on_success(&self, job: &Job, result: serde_json::Value, duration_ms: i64) {
        let completion = Completion {
            attempts: job.attempts + 1,
            result,
            processing_time_ms: duration_ms,
            completed_at: self.time_provider.now_millis(),
        };

        let persisted = self
            .persist(job, "complete", || self.store.complete(&job.id, &completion))
            .await;
        if persisted {
            info!(job_id = %job.id, duration_ms = duration_ms, "Job completed");
            self.metrics.job_completed(&job.kind);
        }
    }

    /// Returns the backoff to wait when the job was re-queued
    async fn on_failure(&self, job: &Job, message: &str) -> Option<std::time::Duration> {
        let (update, backoff) = self.retry_policy.failure_update(job, message);

        let persisted = self
            .persist(job, "fail_or_retry", || self.store.fail_or_retry(&job.id, &update))
            .await;
        if !persisted {
            return None;
        }

        match update.status {
            JobStatus::Pending => {
                warn!(
                    job_id = %job.id,
                    attempts = update.attempts,
                    max_attempts = job.max_attempts,
                    error = %message,
                    "Job failed, re-queued for retry"
                );
                self.metrics.job_retried(&job.kind);
                backoff
            }
            _ => {
                error!(
                    job_id = %job.id,
                    attempts = update.attempts,
                    error = %message,
                    "Job failed permanently"
                );
                self.metrics.job_failed(&job.kind);
                None
            }
        }
    }

    /// Apply a finalization write, retrying transient store errors.
    ///
    /// A row that is no longer `processing` (e.g. reclaimed) is not retried.
    /// Exhausted retries raise an alert and leave the row for the reclaimer.
    async fn persist<F, Fut>(&self, job: &Job, operation: &'static str, mut write: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        for attempt in 1..=FINALIZE_MAX_ATTEMPTS {
            match write().await {
                Ok(true) => return true,
                Ok(false) => {
                    warn!(
                        job_id = %job.id,
                        operation = operation,
                        "Job is no longer processing, update skipped"
                    );
                    return false;
                }
                Err(e) if attempt < FINALIZE_MAX_ATTEMPTS => {
                    warn!(
                        job_id = %job.id,
                        operation = operation,
                        attempt = attempt,
                        error = %e,
                        "Finalization write failed, retrying"
                    );
                    sleep(FINALIZE_RETRY_DELAY * attempt).await;
                }
                Err(e) => {
                    error!(
                        alert = "finalize_failed",
                        job_id = %job.id,
                        operation = operation,
                        error = %e,
                        "Could not persist job outcome; reclaimer will terminalize it"
                    );
                    return false;
                }
            }
        }
        false
    }
}
