// Retry logic
use crate::config::WorkerConfig;
use crate::domain::{Job, JobStatus};
use crate::port::{FailureUpdate, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue with the new attempt count, then back off
    Retry { attempts: i32, delay: Duration },
    /// Attempts exhausted, job has failed permanently
    Failed { attempts: i32 },
}

/// Retry policy
///
/// The attempt count is the only input to both the exhaustion check and the
/// backoff delay: `delay = min(base * 2^attempts, cap)` where `attempts` is the
/// post-increment count.
pub struct RetryPolicy {
    time_provider: Arc<dyn TimeProvider>,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for `completed_at`
    /// * `base_delay_ms` - Base delay in milliseconds (default: 1000)
    /// * `max_delay_ms` - Backoff cap in milliseconds (default: 60000)
    pub fn new(time_provider: Arc<dyn TimeProvider>, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            time_provider,
            base_delay_ms,
            max_delay_ms,
        }
    }

    pub fn from_config(time_provider: Arc<dyn TimeProvider>, config: &WorkerConfig) -> Self {
        Self::new(
            time_provider,
            config.retry_base_delay_ms,
            config.retry_max_delay_ms,
        )
    }

    /// Backoff for a post-increment attempt count
    pub fn backoff(&self, attempts: i32) -> Duration {
        let exponent = u32::try_from(attempts).unwrap_or(0);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let delay_ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Decide what happens to `job` after a failed attempt.
    ///
    /// `job.attempts` is the count before this attempt.
    pub fn decide(&self, job: &Job) -> RetryDecision {
        let attempts = job.attempts.saturating_add(1);

        if attempts >= job.max_attempts {
            warn!(
                job_id = %job.id,
                attempts = %attempts,
                max_attempts = %job.max_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::Failed {
                attempts: attempts.min(job.max_attempts.max(1)),
            };
        }

        let delay = self.backoff(attempts);
        info!(
            job_id = %job.id,
            attempt = %attempts,
            max_attempts = %job.max_attempts,
            delay_ms = %delay.as_millis(),
            "Scheduling retry"
        );
        RetryDecision::Retry { attempts, delay }
    }

    /// Build the store write for a failed attempt, plus the backoff to honour
    /// before releasing the slot (None when terminal).
    pub fn failure_update(&self, job: &Job, message: &str) -> (FailureUpdate, Option<Duration>) {
        match self.decide(job) {
            RetryDecision::Retry { attempts, delay } => (
                FailureUpdate {
                    attempts,
                    status: JobStatus::Pending,
                    error: format!("retry {}/{}: {}", attempts, job.max_attempts, message),
                    completed_at: None,
                },
                Some(delay),
            ),
            RetryDecision::Failed { attempts } => (
                FailureUpdate {
                    attempts,
                    status: JobStatus::Failed,
                    error: message.to_string(),
                    completed_at: Some(self.time_provider.now_millis()),
                },
                None,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use serde_json::json;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Arc::new(ManualTimeProvider::new(5_000)), 1000, 60_000)
    }

    #[test]
    fn test_backoff_formula() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_millis(2_000));
        assert_eq!(p.backoff(2), Duration::from_millis(4_000));
        assert_eq!(p.backoff(5), Duration::from_millis(32_000));
        assert_eq!(p.backoff(6), Duration::from_millis(60_000));
        assert_eq!(p.backoff(64), Duration::from_millis(60_000));
        assert_eq!(p.backoff(i32::MAX), Duration::from_millis(60_000));
    }

    #[test]
    fn test_backoff_strictly_grows_until_cap() {
        let p = policy();
        let mut previous = Duration::ZERO;
        for attempts in 1..=5 {
            let d = p.backoff(attempts);
            assert!(d > previous);
            previous = d;
        }
    }

    #[test]
    fn test_retry_before_exhaustion() {
        let job = Job::new_test("meal_plan", json!({})).with_max_attempts(3);
        assert_eq!(
            policy().decide(&job),
            RetryDecision::Retry {
                attempts: 1,
                delay: Duration::from_millis(2_000)
            }
        );
    }

    #[test]
    fn test_fail_when_exhausted() {
        let mut job = Job::new_test("meal_plan", json!({})).with_max_attempts(3);
        job.attempts = 2;
        assert_eq!(policy().decide(&job), RetryDecision::Failed { attempts: 3 });
    }

    #[test]
    fn test_single_attempt_job_fails_immediately() {
        let job = Job::new_test("meal_plan", json!({})).with_max_attempts(1);
        let (update, backoff) = policy().failure_update(&job, "model timeout");
        assert_eq!(update.status, JobStatus::Failed);
        assert_eq!(update.attempts, 1);
        assert_eq!(update.error, "model timeout");
        assert_eq!(update.completed_at, Some(5_000));
        assert!(backoff.is_none());
    }

    #[test]
    fn test_retry_note_format() {
        let mut job = Job::new_test("meal_plan", json!({})).with_max_attempts(3);
        job.attempts = 1;
        let (update, backoff) = policy().failure_update(&job, "model timeout");
        assert_eq!(update.status, JobStatus::Pending);
        assert_eq!(update.attempts, 2);
        assert_eq!(update.error, "retry 2/3: model timeout");
        assert!(update.completed_at.is_none());
        assert_eq!(backoff, Some(Duration::from_millis(4_000)));
    }

    #[test]
    fn test_attempts_never_exceed_max() {
        let mut job = Job::new_test("meal_plan", json!({})).with_max_attempts(2);
        job.attempts = 5;
        match policy().decide(&job) {
            RetryDecision::Failed { attempts } => assert_eq!(attempts, 2),
            other => panic!("unexpected decision {:?}", other),
        }
    }
}
