// Worker - lifecycle around the Poll Loop and the Stuck-Job Reclaimer

pub mod concurrency;
pub mod constants;
mod execution;
mod panic_guard;
mod poll;
mod shutdown;

use constants::*;
pub use concurrency::{AdmissionGuard, ConcurrencyController};
pub use execution::JobRunner;
pub use panic_guard::run_isolated;
pub use poll::PollLoop;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::reclaimer::StuckJobReclaimer;
use crate::application::retry::RetryPolicy;
use crate::config::WorkerConfig;
use crate::error::{AppError, Result};
use crate::port::{JobMetrics, JobProcessor, JobStore, TimeProvider, TracingMetrics};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Stopped,
    Running,
    Draining,
}

/// Point-in-time worker report
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub worker_id: String,
    pub state: WorkerState,
    pub running: bool,
    pub concurrency: usize,
    pub active_jobs: usize,
    pub uptime_ms: i64,
}

struct Lifecycle {
    state: WorkerState,
    started_at: Option<i64>,
    shutdown: Option<ShutdownSender>,
    tasks: Vec<JoinHandle<()>>,
}

/// Worker processes jobs from the shared store
pub struct Worker {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    processor: Arc<dyn JobProcessor>,
    metrics: Arc<dyn JobMetrics>,
    time_provider: Arc<dyn TimeProvider>,
    controller: ConcurrencyController,
    lifecycle: Mutex<Lifecycle>,
}

impl Worker {
    /// Create a worker; an invalid configuration is rejected here, before any loop runs
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        processor: Arc<dyn JobProcessor>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let controller = ConcurrencyController::new(config.concurrency);
        Ok(Self {
            config,
            store,
            processor,
            metrics: Arc::new(TracingMetrics),
            time_provider,
            controller,
            lifecycle: Mutex::new(Lifecycle {
                state: WorkerState::Stopped,
                started_at: None,
                shutdown: None,
                tasks: Vec::new(),
            }),
        })
    }

    /// Replace the default tracing metrics sink
    pub fn with_metrics(mut self, metrics: Arc<dyn JobMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Launch the Poll Loop and the Stuck-Job Reclaimer; returns immediately
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state != WorkerState::Stopped {
            return Err(AppError::InvalidState(format!(
                "worker {} is already {:?}",
                self.config.worker_id, lifecycle.state
            )));
        }

        let (shutdown_tx, shutdown_rx) = shutdown_channel();

        let retry_policy = Arc::new(RetryPolicy::from_config(
            Arc::clone(&self.time_provider),
            &self.config,
        ));
        let runner = Arc::new(JobRunner::new(
            self.config.worker_id.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.processor),
            retry_policy,
            Arc::clone(&self.metrics),
            Arc::clone(&self.time_provider),
        ));
        let poll_loop = PollLoop::new(
            self.config.worker_id.clone(),
            Arc::clone(&self.store),
            self.controller.clone(),
            runner,
            Arc::clone(&self.time_provider),
            self.config.poll_interval(),
        );
        let reclaimer = StuckJobReclaimer::new(
            Arc::clone(&self.store),
            Arc::clone(&self.time_provider),
            Arc::clone(&self.metrics),
            self.config.stuck_job_timeout_ms as i64,
            self.config.reclaim_interval(),
        );

        let poll_token = shutdown_rx.clone();
        let poll_handle = tokio::spawn(async move { poll_loop.run(poll_token).await });
        let reclaim_handle = tokio::spawn(async move { reclaimer.run(shutdown_rx).await });

        lifecycle.state = WorkerState::Running;
        lifecycle.started_at = Some(self.time_provider.now_millis());
        lifecycle.shutdown = Some(shutdown_tx);
        lifecycle.tasks = vec![poll_handle, reclaim_handle];

        info!(
            worker_id = %self.config.worker_id,
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval_ms,
            stuck_job_timeout_ms = self.config.stuck_job_timeout_ms,
            "Worker started"
        );
        Ok(())
    }

    /// Stop both loops, then wait until every admitted job has finished.
    ///
    /// In-flight processor calls are never cancelled; they only observe the
    /// shutdown flag through their `JobContext`.
    pub async fn stop(&self) {
        let (shutdown, tasks) = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state != WorkerState::Running {
                return;
            }
            lifecycle.state = WorkerState::Draining;
            (lifecycle.shutdown.take(), std::mem::take(&mut lifecycle.tasks))
        };

        info!(worker_id = %self.config.worker_id, "Worker stopping, draining in-flight jobs");
        if let Some(tx) = shutdown {
            tx.shutdown();
        }

        for task in tasks {
            if let Err(e) = task.await {
                error!(worker_id = %self.config.worker_id, error = %e, "Worker loop task failed");
            }
        }

        while self.controller.size() > 0 {
            sleep(DRAIN_POLL_INTERVAL).await;
        }

        let mut lifecycle = self.lifecycle();
        lifecycle.state = WorkerState::Stopped;
        lifecycle.started_at = None;
        info!(worker_id = %self.config.worker_id, "Worker stopped");
    }

    /// Current worker report (pure read)
    pub fn status(&self) -> WorkerStatus {
        let lifecycle = self.lifecycle();
        let uptime_ms = lifecycle
            .started_at
            .map(|t| (self.time_provider.now_millis() - t).max(0))
            .unwrap_or(0);
        WorkerStatus {
            worker_id: self.config.worker_id.clone(),
            state: lifecycle.state,
            running: lifecycle.state == WorkerState::Running,
            concurrency: self.config.concurrency,
            active_jobs: self.controller.size(),
            uptime_ms,
        }
    }
}
