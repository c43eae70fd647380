// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_processor;
pub mod job_store;
pub mod metrics;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use job_processor::{JobContext, JobProcessor, ProcessingError};
pub use job_store::{Completion, FailureUpdate, JobStore};
pub use metrics::{JobMetrics, TracingMetrics};
pub use time_provider::TimeProvider;
