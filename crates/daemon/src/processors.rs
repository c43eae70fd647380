//! Built-in processors registered by the daemon

use analysis_worker_core::domain::Job;
use analysis_worker_core::port::{JobContext, JobProcessor, ProcessingError};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

pub const ECHO_KIND: &str = "echo";

/// Smoke-test processor: returns its input.
///
/// Optional input fields:
/// - `delay_ms`: simulated work, cut short when the worker stops
/// - `fail`: error message to fail the attempt with
pub struct EchoProcessor;

#[async_trait]
impl JobProcessor for EchoProcessor {
    async fn process(
        &self,
        job: &Job,
        ctx: &JobContext,
    ) -> Result<serde_json::Value, ProcessingError> {
        let input = job.input.as_value();

        if let Some(delay_ms) = input.get("delay_ms") {
            let delay_ms = delay_ms
                .as_u64()
                .ok_or_else(|| ProcessingError::InvalidInput("delay_ms must be a u64".into()))?;
            let mut shutdown = ctx.shutdown_token();
            if shutdown
                .sleep_or_shutdown(Duration::from_millis(delay_ms))
                .await
            {
                return Err(ProcessingError::Cancelled("worker stopping".to_string()));
            }
        }

        if let Some(message) = input.get("fail").and_then(|v| v.as_str()) {
            return Err(ProcessingError::Failed(message.to_string()));
        }

        Ok(json!({
            "echo": input,
            "worker_id": ctx.worker_id,
            "attempt": ctx.attempt,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_worker_core::application::shutdown_channel;

    fn ctx() -> (analysis_worker_core::application::ShutdownSender, JobContext) {
        let (tx, token) = shutdown_channel();
        (tx, JobContext::new("daemon-test", 2, token))
    }

    #[tokio::test]
    async fn test_echo_returns_input() {
        let (_tx, ctx) = ctx();
        let job = Job::new_test(ECHO_KIND, json!({"meal": "salad"}));
        let result = EchoProcessor.process(&job, &ctx).await.unwrap();
        assert_eq!(result["echo"], json!({"meal": "salad"}));
        assert_eq!(result["worker_id"], "daemon-test");
        assert_eq!(result["attempt"], 2);
    }

    #[tokio::test]
    async fn test_echo_fail_field() {
        let (_tx, ctx) = ctx();
        let job = Job::new_test(ECHO_KIND, json!({"fail": "model unavailable"}));
        assert_eq!(
            EchoProcessor.process(&job, &ctx).await,
            Err(ProcessingError::Failed("model unavailable".to_string()))
        );
    }

    #[tokio::test]
    async fn test_echo_delay_cut_short_by_shutdown() {
        let (tx, ctx) = ctx();
        tx.shutdown();
        let job = Job::new_test(ECHO_KIND, json!({"delay_ms": 60_000}));
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            EchoProcessor.process(&job, &ctx),
        )
        .await
        .unwrap();
        assert!(matches!(result, Err(ProcessingError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_echo_rejects_bad_delay() {
        let (_tx, ctx) = ctx();
        let job = Job::new_test(ECHO_KIND, json!({"delay_ms": "soon"}));
        assert!(matches!(
            EchoProcessor.process(&job, &ctx).await,
            Err(ProcessingError::InvalidInput(_))
        ));
    }
}
