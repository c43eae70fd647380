// Panic isolation for processor calls
use std::any::Any;
use std::future::Future;
use tokio::task::JoinError;
use tracing::error;

use crate::port::ProcessingError;

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Run a future on its own task so a panic surfaces as a `ProcessingError`
/// instead of unwinding through the worker.
pub async fn run_isolated<F, T>(future: F) -> Result<T, ProcessingError>
where
    F: Future<Output = Result<T, ProcessingError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn(future).await {
        Ok(result) => result,
        Err(join_err) => Err(join_error_to_processing(join_err)),
    }
}

fn join_error_to_processing(join_err: JoinError) -> ProcessingError {
    if join_err.is_panic() {
        let msg = panic_message(join_err.into_panic().as_ref());
        error!(panic_msg = %msg, "Job processor panicked");
        ProcessingError::Panicked(msg)
    } else {
        ProcessingError::Cancelled("processor task was cancelled".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exploding_processor() -> Result<(), ProcessingError> {
        panic!("vision model exploded")
    }

    async fn formatted_panic(code: i32) -> Result<(), ProcessingError> {
        panic!("bad code {}", code)
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let result = run_isolated(exploding_processor()).await;
        assert_eq!(
            result,
            Err(ProcessingError::Panicked("vision model exploded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_formatted_panic_message() {
        let result = run_isolated(formatted_panic(42)).await;
        assert_eq!(result, Err(ProcessingError::Panicked("bad code 42".to_string())));
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = run_isolated(async { Ok::<_, ProcessingError>(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
