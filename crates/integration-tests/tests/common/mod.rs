//! Shared fixtures for integration tests
#![allow(dead_code)]

use analysis_worker_core::application::{EnqueueRequest, JobService};
use analysis_worker_core::domain::{Job, JobId};
use analysis_worker_core::port::id_provider::mocks::SequentialIdProvider;
use analysis_worker_core::port::time_provider::mocks::ManualTimeProvider;
use analysis_worker_core::port::{JobContext, JobProcessor, JobStore, ProcessingError};
use analysis_worker_core::WorkerConfig;
use analysis_worker_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// SQLite file in the temp dir, removed (with WAL side files) on drop
pub struct TempDb {
    pub path: PathBuf,
}

impl TempDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("analysis-worker-{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    pub async fn pool(&self) -> SqlitePool {
        let pool = create_pool(self.path.to_str().unwrap()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    /// Each call opens an independent pool, like a separate worker process would
    pub async fn store(&self) -> Arc<SqliteJobStore> {
        Arc::new(SqliteJobStore::new(self.pool().await))
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

pub fn fast_config(worker_id: &str, concurrency: usize) -> WorkerConfig {
    WorkerConfig {
        worker_id: worker_id.to_string(),
        concurrency,
        poll_interval_ms: 10,
        stuck_job_timeout_ms: 60_000,
        reclaim_interval_ms: 50,
        retry_base_delay_ms: 5,
        retry_max_delay_ms: 20,
    }
}

/// Enqueues through the real use case with deterministic ids and strictly increasing `created_at`
pub struct Enqueuer {
    service: JobService,
    clock: Arc<ManualTimeProvider>,
}

impl Enqueuer {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        let clock = Arc::new(ManualTimeProvider::new(1_000));
        let service = JobService::new(store, Arc::new(SequentialIdProvider::new("job")), clock.clone());
        Self { service, clock }
    }

    pub async fn enqueue(&self, kind: &str, priority: i32, max_attempts: i32) -> JobId {
        self.clock.advance(1);
        self.service
            .enqueue(EnqueueRequest {
                owner: "user-1".to_string(),
                kind: kind.to_string(),
                input: serde_json::json!({"kind": kind}),
                priority,
                max_attempts,
            })
            .await
            .unwrap()
    }

    pub fn service(&self) -> &JobService {
        &self.service
    }
}

/// One processor invocation as observed by `RecordingProcessor`
#[derive(Debug, Clone)]
pub struct Execution {
    pub job_id: JobId,
    pub worker_id: String,
    pub attempt: i32,
    pub started: Instant,
    pub finished: Instant,
}

/// Processor that records every invocation.
/// Attempts numbered `<= fail_attempts` fail; later ones succeed.
pub struct RecordingProcessor {
    delay: Duration,
    fail_attempts: i32,
    executions: Mutex<Vec<Execution>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            fail_attempts: 0,
            executions: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(mut self, attempts: i32) -> Self {
        self.fail_attempts = attempts;
        self
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.executions.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobProcessor for RecordingProcessor {
    async fn process(
        &self,
        job: &Job,
        ctx: &JobContext,
    ) -> Result<serde_json::Value, ProcessingError> {
        let started = Instant::now();
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_running, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.executions.lock().unwrap().push(Execution {
            job_id: job.id.clone(),
            worker_id: ctx.worker_id.clone(),
            attempt: ctx.attempt,
            started,
            finished: Instant::now(),
        });

        if ctx.attempt <= self.fail_attempts {
            return Err(ProcessingError::Failed(format!("model timeout on attempt {}", ctx.attempt)));
        }
        Ok(serde_json::json!({"analysed": job.id, "attempt": ctx.attempt}))
    }
}

/// Poll the store until every job is terminal; panics after 10s
pub async fn wait_for_terminal(store: &dyn JobStore, ids: &[JobId]) -> Vec<Job> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            jobs.push(store.find_by_id(id).await.unwrap().unwrap());
        }
        if jobs.iter().all(Job::is_terminal) {
            return jobs;
        }
        assert!(Instant::now() < deadline, "jobs not terminal in time: {:?}", jobs);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
