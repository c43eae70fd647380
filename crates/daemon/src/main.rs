//! Analysis Worker - Main Entry Point

mod processors;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use analysis_worker_core::application::{JobService, ProcessorRouter, Worker};
use analysis_worker_core::domain::JobStatus;
use analysis_worker_core::port::id_provider::UuidProvider;
use analysis_worker_core::port::time_provider::SystemTimeProvider;
use analysis_worker_core::{WorkerConfig, VERSION};
use analysis_worker_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use processors::{EchoProcessor, ECHO_KIND};

const DEFAULT_DB_PATH: &str = "~/.analysis-worker/jobs.db";
const LOG_FILE_PREFIX: &str = "analysis-worker.log";

/// Install the global subscriber; the returned guard flushes the file writer on drop
fn init_logging() -> Result<Option<WorkerGuard>> {
    let log_format =
        std::env::var("JOB_WORKER_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("analysis_worker=info"))?;

    let mut layers = Vec::new();
    match log_format.as_str() {
        // Production: JSON structured logging
        "json" => layers.push(fmt::layer().json().boxed()),
        // Development: pretty formatting with colors
        _ => layers.push(fmt::layer().pretty().boxed()),
    }

    let mut guard = None;
    if let Ok(dir) = std::env::var("JOB_WORKER_LOG_DIR") {
        let dir = shellexpand::tilde(&dir).into_owned();
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let _log_guard = init_logging()?;
    info!("Analysis Worker v{} starting...", VERSION);

    // 2. Load configuration (malformed values are fatal)
    let config = WorkerConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let db_path = std::env::var("JOB_WORKER_DB_PATH")
        .map(|p| shellexpand::tilde(&p).into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());

    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    info!(db_path = %db_path, "Initializing database...");

    // 3. Initialize database
    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let store = Arc::new(SqliteJobStore::new(pool));
    let router = ProcessorRouter::new().register(ECHO_KIND, Arc::new(EchoProcessor));
    info!(kinds = ?router.kinds(), "Processors registered");

    let jobs = JobService::new(store.clone(), Arc::new(UuidProvider), time_provider.clone());
    let pending = jobs
        .count(JobStatus::Pending)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read queue depth: {}", e))?;
    info!(pending_jobs = pending, "Queue loaded");

    // 5. Start worker (poll loop + stuck-job reclaimer)
    let worker = Worker::new(config, store, Arc::new(router), time_provider)
        .map_err(|e| anyhow::anyhow!("Worker setup failed: {}", e))?;
    worker
        .start()
        .map_err(|e| anyhow::anyhow!("Worker start failed: {}", e))?;

    info!("System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Draining in-flight jobs...");

    // 7. Graceful shutdown
    worker.stop().await;
    let status = worker.status();
    info!(worker_id = %status.worker_id, state = ?status.state, "Shutdown complete.");

    Ok(())
}
