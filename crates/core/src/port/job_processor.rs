// Job Processor Port
// Abstraction over the business logic that executes one job's input

use crate::application::worker::ShutdownToken;
use crate::domain::Job;
use async_trait::async_trait;
use thiserror::Error;

/// Processing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("{0}")]
    Failed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown job kind: {0}")]
    UnknownKind(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("processor panicked: {0}")]
    Panicked(String),
}

/// Per-attempt context handed to the processor
#[derive(Clone)]
pub struct JobContext {
    pub worker_id: String,
    /// 1-based number of the attempt being executed
    pub attempt: i32,
    shutdown: ShutdownToken,
}

impl JobContext {
    pub fn new(worker_id: impl Into<String>, attempt: i32, shutdown: ShutdownToken) -> Self {
        Self {
            worker_id: worker_id.into(),
            attempt,
            shutdown,
        }
    }

    /// True once the worker has been asked to stop.
    /// Processors may return early; nothing forces them to.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_shutdown()
    }

    /// Owned token for `select!`-style waiting on stop
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }
}

/// Job Processor trait
///
/// Must be safe to invoke concurrently for distinct jobs.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Execute a job and return its result payload
    async fn process(&self, job: &Job, ctx: &JobContext)
        -> Result<serde_json::Value, ProcessingError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Outcome of one scripted call
    #[derive(Debug, Clone)]
    pub enum MockOutcome {
        Succeed(serde_json::Value),
        Fail(String),
        Panic(String),
    }

    /// Processor that replays a script, then falls back to a default outcome.
    /// Tracks call count and peak concurrent invocations.
    pub struct ScriptedProcessor {
        script: Mutex<VecDeque<MockOutcome>>,
        fallback: MockOutcome,
        delay: Duration,
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedProcessor {
        pub fn new(script: Vec<MockOutcome>, fallback: MockOutcome) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        pub fn new_success() -> Self {
            Self::new(Vec::new(), MockOutcome::Succeed(serde_json::json!({"ok": true})))
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(Vec::new(), MockOutcome::Fail(message.into()))
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        fn next_outcome(&self) -> MockOutcome {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    #[async_trait]
    impl JobProcessor for ScriptedProcessor {
        async fn process(
            &self,
            _job: &Job,
            _ctx: &JobContext,
        ) -> Result<serde_json::Value, ProcessingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now_running, Ordering::SeqCst);

            let outcome = self.next_outcome();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.running.fetch_sub(1, Ordering::SeqCst);

            match outcome {
                MockOutcome::Succeed(value) => Ok(value),
                MockOutcome::Fail(msg) => Err(ProcessingError::Failed(msg)),
                MockOutcome::Panic(msg) => panic!("{}", msg),
            }
        }
    }
}
