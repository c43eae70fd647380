// Enqueue Use Case

use crate::domain::job::DEFAULT_MAX_ATTEMPTS;
use crate::domain::{Job, JobId, JobInput, JobKind};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobStore, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

const MAX_KIND_LEN: usize = 64;
const MAX_ATTEMPTS_LIMIT: i32 = 100;

/// Enqueue request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub owner: String,
    pub kind: String,
    pub input: serde_json::Value,

    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

fn default_max_attempts() -> i32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Validate an enqueue request before it reaches the store
pub fn validate_request(req: &EnqueueRequest) -> Result<()> {
    if req.owner.trim().is_empty() {
        return Err(AppError::Validation("owner cannot be empty".to_string()));
    }
    if req.kind.is_empty() {
        return Err(AppError::Validation("kind cannot be empty".to_string()));
    }
    if req.kind.len() > MAX_KIND_LEN {
        return Err(AppError::Validation(format!(
            "kind too long (max {} chars)",
            MAX_KIND_LEN
        )));
    }
    if !req
        .kind
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(AppError::Validation(
            "kind must be alphanumeric with '_', '-' or '.'".to_string(),
        ));
    }
    if !(1..=MAX_ATTEMPTS_LIMIT).contains(&req.max_attempts) {
        return Err(AppError::Validation(format!(
            "max_attempts {} out of range 1..={}",
            req.max_attempts, MAX_ATTEMPTS_LIMIT
        )));
    }
    Ok(())
}

/// Execute enqueue use case
///
/// # Arguments
///
/// * `store` - Job store
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `req` - Enqueue request
pub async fn execute(
    store: &dyn JobStore,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: EnqueueRequest,
) -> Result<JobId> {
    validate_request(&req)?;

    let job_id = id_provider.generate_id();
    let created_at = time_provider.now_millis();

    let job = Job::new(
        job_id.clone(),
        created_at,
        req.owner,
        JobKind::new(req.kind),
        JobInput::new(req.input),
    )
    .with_priority(req.priority)
    .with_max_attempts(req.max_attempts);

    store.insert(&job).await?;

    info!(job_id = %job_id, kind = %job.kind, priority = job.priority, "Job enqueued");
    Ok(job_id)
}
