// Stuck-job reclaimer
use crate::application::worker::constants::STUCK_JOB_ERROR;
use crate::application::worker::ShutdownToken;
use crate::port::{JobMetrics, JobStore, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Force-fails jobs left in `processing` past the stuck timeout
///
/// Acts purely on the store's view of elapsed time, whether or not the
/// owning worker process is still alive.
pub struct StuckJobReclaimer {
    store: Arc<dyn JobStore>,
    time_provider: Arc<dyn TimeProvider>,
    metrics: Arc<dyn JobMetrics>,
    stuck_timeout_ms: i64,
    interval: Duration,
}

impl StuckJobReclaimer {
    /// Create a new reclaimer
    ///
    /// # Arguments
    /// * `store` - Job store
    /// * `time_provider` - Time provider
    /// * `metrics` - Metrics sink for reclaim counts
    /// * `stuck_timeout_ms` - Age after which a processing job is considered orphaned
    /// * `interval` - Delay between scans
    pub fn new(
        store: Arc<dyn JobStore>,
        time_provider: Arc<dyn TimeProvider>,
        metrics: Arc<dyn JobMetrics>,
        stuck_timeout_ms: i64,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            time_provider,
            metrics,
            stuck_timeout_ms,
            interval,
        }
    }

    /// Run one scan. Returns the number of jobs reclaimed.
    ///
    /// A failed scan is an error; a failed write for one job is logged and
    /// the remaining jobs are still processed.
    pub async fn reclaim_once(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.stuck_timeout_ms;

        let stuck = self.store.find_stuck(cutoff).await?;
        let mut reclaimed = 0;

        for job in stuck {
            match self.store.force_fail(&job.id, STUCK_JOB_ERROR, now, cutoff).await {
                Ok(true) => {
                    warn!(
                        job_id = %job.id,
                        worker_id = ?job.worker_id,
                        started_at = ?job.started_at,
                        cutoff = cutoff,
                        "Reclaimed stuck job"
                    );
                    reclaimed += 1;
                }
                Ok(false) => {
                    info!(job_id = %job.id, "Stuck job finished before reclaim, skipping");
                }
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "Failed to reclaim stuck job");
                }
            }
        }

        if reclaimed > 0 {
            self.metrics.jobs_reclaimed(reclaimed);
        }
        Ok(reclaimed)
    }

    /// Scan loop (background task), scanning immediately then every interval
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(
            stuck_timeout_ms = self.stuck_timeout_ms,
            interval_ms = self.interval.as_millis() as u64,
            "Stuck-job reclaimer started"
        );

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            match self.reclaim_once().await {
                Ok(0) => {}
                Ok(count) => info!(reclaimed = count, "Stuck-job scan complete"),
                Err(e) => error!(error = %e, "Stuck-job scan failed"),
            }

            if shutdown.sleep_or_shutdown(self.interval).await {
                break;
            }
        }

        info!("Stuck-job reclaimer stopped");
    }
}
