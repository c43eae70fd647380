// Application Layer - Use Cases and Worker Services

pub mod jobs;
pub mod reclaimer;
pub mod retry;
pub mod router;
pub mod worker;

// Re-exports
pub use jobs::{EnqueueRequest, JobService};
pub use reclaimer::StuckJobReclaimer;
pub use retry::{RetryDecision, RetryPolicy};
pub use router::ProcessorRouter;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker, WorkerState, WorkerStatus};
