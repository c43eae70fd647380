// Job Metrics Port
// Boundary to the observability sink; the worker only reports, never reads back.

use crate::domain::JobKind;
use tracing::debug;

pub trait JobMetrics: Send + Sync {
    /// Wall-clock duration of one execution attempt
    fn record_duration(&self, kind: &JobKind, duration_ms: i64);

    fn job_completed(&self, kind: &JobKind);

    fn job_retried(&self, kind: &JobKind);

    fn job_failed(&self, kind: &JobKind);

    fn jobs_reclaimed(&self, count: usize);
}

/// Emits metrics as tracing events (default sink)
pub struct TracingMetrics;

impl JobMetrics for TracingMetrics {
    fn record_duration(&self, kind: &JobKind, duration_ms: i64) {
        debug!(metric = "job_duration_ms", kind = %kind, value = duration_ms);
    }

    fn job_completed(&self, kind: &JobKind) {
        debug!(metric = "jobs_completed_total", kind = %kind, value = 1);
    }

    fn job_retried(&self, kind: &JobKind) {
        debug!(metric = "jobs_retried_total", kind = %kind, value = 1);
    }

    fn job_failed(&self, kind: &JobKind) {
        debug!(metric = "jobs_failed_total", kind = %kind, value = 1);
    }

    fn jobs_reclaimed(&self, count: usize) {
        debug!(metric = "jobs_reclaimed_total", value = count);
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counting metrics sink for assertions
    #[derive(Default)]
    pub struct CountingMetrics {
        pub durations: AtomicUsize,
        pub completed: AtomicUsize,
        pub retried: AtomicUsize,
        pub failed: AtomicUsize,
        pub reclaimed: AtomicUsize,
    }

    impl CountingMetrics {
        pub fn completed(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }

        pub fn retried(&self) -> usize {
            self.retried.load(Ordering::SeqCst)
        }

        pub fn failed(&self) -> usize {
            self.failed.load(Ordering::SeqCst)
        }

        pub fn reclaimed(&self) -> usize {
            self.reclaimed.load(Ordering::SeqCst)
        }
    }

    impl JobMetrics for CountingMetrics {
        fn record_duration(&self, _kind: &JobKind, _duration_ms: i64) {
            self.durations.fetch_add(1, Ordering::SeqCst);
        }

        fn job_completed(&self, _kind: &JobKind) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn job_retried(&self, _kind: &JobKind) {
            self.retried.fetch_add(1, Ordering::SeqCst);
        }

        fn job_failed(&self, _kind: &JobKind) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        fn jobs_reclaimed(&self, count: usize) {
            self.reclaimed.fetch_add(count, Ordering::SeqCst);
        }
    }
}
