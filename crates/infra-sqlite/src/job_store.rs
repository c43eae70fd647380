// SQLite JobStore Implementation

use analysis_worker_core::domain::{Job, JobId, JobInput, JobKind, JobStatus};
use analysis_worker_core::error::{AppError, Result};
use analysis_worker_core::port::{Completion, FailureUpdate, JobStore};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{error, warn};

const UNDECODABLE_ROW_ERROR: &str = "undecodable job row";

// Helper to convert sqlx::Error to AppError with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            match db_err.code().as_deref() {
                Some("2067") | Some("1555") => AppError::Database(format!(
                    "Unique constraint violation: {}",
                    db_err.message()
                )),
                Some("275") => AppError::Database(format!(
                    "Check constraint violation: {}",
                    db_err.message()
                )),
                Some("5") => AppError::Database(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                Some("13") => AppError::Database(format!("Database full: {}", db_err.message())),
                Some(code) => AppError::Database(format!(
                    "Database error [{}]: {}",
                    code,
                    db_err.message()
                )),
                None => AppError::Database(format!("Database error: {}", db_err.message())),
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Decode scanned rows one by one.
    ///
    /// A row that cannot be decoded is failed in place so it cannot hold the
    /// head of the queue (or the stuck scan) on every later pass.
    async fn decode_rows(&self, rows: Vec<JobRow>) -> Vec<Job> {
        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            let status = row.status.clone();
            match row.into_job() {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    warn!(job_id = %id, status = %status, error = %e, "Failing undecodable job row");
                    if let Err(write_err) = self.fail_undecodable(&id, &status, &e).await {
                        error!(job_id = %id, error = %write_err, "Failed to fail undecodable job row");
                    }
                }
            }
        }
        jobs
    }

    async fn fail_undecodable(&self, id: &str, status: &str, cause: &AppError) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', error = ?,
                completed_at = CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(format!("{}: {}", UNDECODABLE_ROW_ERROR, cause))
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        let result_str = job.result.as_ref().map(|v| v.to_string());

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, owner, kind, input,
                status, priority, attempts, max_attempts,
                created_at, started_at, completed_at,
                worker_id, result, error, processing_time_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.owner)
        .bind(job.kind.as_str())
        .bind(job.input.as_value().to_string())
        .bind(job.status.as_str())
        .bind(job.priority)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(&job.worker_id)
        .bind(&result_str)
        .bind(&job.error)
        .bind(job.processing_time_ms)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE status = 'pending'
            ORDER BY priority ASC, created_at ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(self.decode_rows(rows).await)
    }

    async fn claim(&self, id: &JobId, worker_id: &str, started_at: i64) -> Result<bool> {
        // Conditional update: only one claimant can observe status = 'pending'
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'processing', started_at = ?, worker_id = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(started_at)
        .bind(worker_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete(&self, id: &JobId, completion: &Completion) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', attempts = ?, result = ?,
                processing_time_ms = ?, completed_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(completion.attempts)
        .bind(completion.result.to_string())
        .bind(completion.processing_time_ms)
        .bind(completion.completed_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn fail_or_retry(&self, id: &JobId, update: &FailureUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, attempts = ?, error = ?,
                completed_at = COALESCE(?, completed_at)
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(update.status.as_str())
        .bind(update.attempts)
        .bind(&update.error)
        .bind(update.completed_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_stuck(&self, cutoff: i64) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE status = 'processing' AND started_at < ?
            ORDER BY started_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(self.decode_rows(rows).await)
    }

    async fn force_fail(
        &self,
        id: &JobId,
        error: &str,
        completed_at: i64,
        cutoff: i64,
    ) -> Result<bool> {
        // Re-checks the stuck condition so a job finishing after the scan is untouched
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', error = ?, completed_at = ?
            WHERE id = ? AND status = 'processing' AND started_at < ?
            "#,
        )
        .bind(error)
        .bind(completed_at)
        .bind(id)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    owner: String,
    kind: String,
    input: String,
    status: String,
    priority: i32,
    attempts: i32,
    max_attempts: i32,
    created_at: i64,
    started_at: Option<i64>,
    completed_at: Option<i64>,
    worker_id: Option<String>,
    result: Option<String>,
    error: Option<String>,
    processing_time_ms: Option<i64>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status: JobStatus = self.status.parse()?;
        let input: serde_json::Value = serde_json::from_str(&self.input)?;
        let result = self
            .result
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()?;

        Ok(Job {
            id: self.id,
            owner: self.owner,
            kind: JobKind::new(self.kind),
            input: JobInput::new(input),
            status,
            priority: self.priority,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            worker_id: self.worker_id,
            result,
            error: self.error,
            processing_time_ms: self.processing_time_ms,
        })
    }
}
