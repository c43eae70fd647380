// Processor Router - dispatches jobs to business logic by kind

use crate::domain::Job;
use crate::port::{JobContext, JobProcessor, ProcessingError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes each job to the processor registered for its `kind`
#[derive(Default)]
pub struct ProcessorRouter {
    routes: HashMap<String, Arc<dyn JobProcessor>>,
}

impl ProcessorRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the processor for a kind
    pub fn register(mut self, kind: impl Into<String>, processor: Arc<dyn JobProcessor>) -> Self {
        self.routes.insert(kind.into(), processor);
        self
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

#[async_trait]
impl JobProcessor for ProcessorRouter {
    async fn process(
        &self,
        job: &Job,
        ctx: &JobContext,
    ) -> Result<serde_json::Value, ProcessingError> {
        match self.routes.get(job.kind.as_str()) {
            Some(processor) => processor.process(job, ctx).await,
            None => Err(ProcessingError::UnknownKind(job.kind.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::worker::shutdown_channel;
    use crate::port::job_processor::mocks::ScriptedProcessor;
    use serde_json::json;

    #[tokio::test]
    async fn test_routes_by_kind() {
        let food = Arc::new(ScriptedProcessor::new_success());
        let exam = Arc::new(ScriptedProcessor::new_fail("bad scan"));
        let router = ProcessorRouter::new()
            .register("food_analysis", food.clone())
            .register("exam_analysis", exam.clone());
        assert_eq!(router.kinds(), vec!["exam_analysis", "food_analysis"]);

        let (_tx, token) = shutdown_channel();
        let ctx = JobContext::new("w1", 1, token);

        let food_job = Job::new_test("food_analysis", json!({}));
        assert!(router.process(&food_job, &ctx).await.is_ok());

        let exam_job = Job::new_test("exam_analysis", json!({}));
        assert_eq!(
            router.process(&exam_job, &ctx).await,
            Err(ProcessingError::Failed("bad scan".to_string()))
        );
        assert_eq!(food.call_count(), 1);
        assert_eq!(exam.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let router = ProcessorRouter::new();
        let (_tx, token) = shutdown_channel();
        let ctx = JobContext::new("w1", 1, token);
        let job = Job::new_test("sleep_report", json!({}));
        assert_eq!(
            router.process(&job, &ctx).await,
            Err(ProcessingError::UnknownKind("sleep_report".to_string()))
        );
    }
}
