// Worker constants (No magic values)
use std::time::Duration;

/// Poll Loop sleep after the store could not be reached (5s)
pub const ERROR_BACKOFF_DURATION: Duration = Duration::from_secs(5);

/// How often `stop()` re-checks the in-flight count while draining (100ms)
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Writes attempted for a terminal/retry update before raising an alert
pub const FINALIZE_MAX_ATTEMPTS: u32 = 3;

/// Base delay between finalization write attempts (multiplied by attempt number)
pub const FINALIZE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Error recorded on jobs force-failed by the reclaimer
pub const STUCK_JOB_ERROR: &str = "exceeded execution timeout";
