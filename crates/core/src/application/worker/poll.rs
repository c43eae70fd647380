// Poll Loop - admits and dispatches pending jobs within the concurrency bound

use super::concurrency::ConcurrencyController;
use super::constants::ERROR_BACKOFF_DURATION;
use super::execution::JobRunner;
use super::shutdown::ShutdownToken;
use crate::domain::Job;
use crate::port::{JobStore, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct PollLoop {
    worker_id: String,
    store: Arc<dyn JobStore>,
    controller: ConcurrencyController,
    runner: Arc<JobRunner>,
    time_provider: Arc<dyn TimeProvider>,
    poll_interval: Duration,
}

impl PollLoop {
    pub fn new(
        worker_id: impl Into<String>,
        store: Arc<dyn JobStore>,
        controller: ConcurrencyController,
        runner: Arc<JobRunner>,
        time_provider: Arc<dyn TimeProvider>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            store,
            controller,
            runner,
            time_provider,
            poll_interval,
        }
    }

    /// Run until shutdown is signalled
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(worker_id = %self.worker_id, "Poll loop started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }

            let free = self.controller.free_slots();
            if free == 0 {
                if shutdown.sleep_or_shutdown(self.poll_interval).await {
                    break;
                }
                continue;
            }

            // Re-queued jobs still backing off here stay in flight; fetch past them
            let window = free + self.controller.size();
            match self.store.fetch_pending(window).await {
                Ok(jobs) => {
                    let dispatched = self.dispatch_batch(jobs, free, &shutdown).await;
                    if dispatched == 0 && shutdown.sleep_or_shutdown(self.poll_interval).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(worker_id = %self.worker_id, error = %e, "Failed to fetch pending jobs");
                    if shutdown.sleep_or_shutdown(ERROR_BACKOFF_DURATION).await {
                        break;
                    }
                }
            }
        }
        info!(worker_id = %self.worker_id, "Poll loop stopped");
    }

    /// Admit, claim and spawn up to `free` jobs, skipping ids already in flight.
    /// Returns how many were dispatched.
    async fn dispatch_batch(&self, jobs: Vec<Job>, free: usize, shutdown: &ShutdownToken) -> usize {
        let mut dispatched = 0;
        for job in jobs {
            if dispatched >= free || shutdown.is_shutdown() {
                break;
            }
            if self.controller.is_active(&job.id) {
                debug!(job_id = %job.id, "Job still in flight locally, skipping");
                continue;
            }
            if self.dispatch(job, shutdown).await {
                dispatched += 1;
            }
        }
        dispatched
    }

    async fn dispatch(&self, mut job: Job, shutdown: &ShutdownToken) -> bool {
        let Some(guard) = self.controller.try_admit(&job.id) else {
            debug!(job_id = %job.id, "Job already in flight or no free slot, skipping");
            return false;
        };

        let now = self.time_provider.now_millis();
        match self.store.claim(&job.id, &self.worker_id, now).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(job_id = %job.id, "Job claimed by another worker, skipping");
                return false;
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Failed to claim job");
                return false;
            }
        }

        if let Err(e) = job.start(self.worker_id.clone(), now) {
            warn!(job_id = %job.id, error = %e, "Claimed job had unexpected local state");
        }

        let runner = Arc::clone(&self.runner);
        let token = shutdown.clone();
        tokio::spawn(async move {
            runner.run(job, guard, token).await;
        });
        true
    }
}
