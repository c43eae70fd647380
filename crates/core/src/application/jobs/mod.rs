// Job Service - use cases for submitting and inspecting jobs

pub mod enqueue;

pub use enqueue::EnqueueRequest;

use crate::domain::{Job, JobId, JobStatus};
use crate::error::Result;
use crate::port::{IdProvider, JobStore, TimeProvider};
use std::sync::Arc;

/// Job Service
pub struct JobService {
    store: Arc<dyn JobStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            id_provider,
            time_provider,
        }
    }

    /// Enqueue a new pending job
    pub async fn enqueue(&self, req: EnqueueRequest) -> Result<JobId> {
        enqueue::execute(
            self.store.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await
    }

    /// Look up a job's current record
    pub async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        self.store.find_by_id(id).await
    }

    pub async fn count(&self, status: JobStatus) -> Result<i64> {
        self.store.count_by_status(status).await
    }
}
