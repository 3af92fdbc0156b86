//! Caller cancellation and deadline handling.

use std::future::Future;

use run_authz_sdk::{CallContext, RunAuthzError};

/// Drive `fut` until it completes, the caller cancels, or the caller's
/// deadline passes. The latter two abandon `fut` and yield `Canceled`.
pub async fn cancellable<T, F>(ctx: &CallContext, fut: F) -> Result<T, RunAuthzError>
where
    F: Future<Output = Result<T, RunAuthzError>>,
{
    if ctx.is_canceled() {
        return Err(RunAuthzError::Canceled);
    }

    let deadline = async {
        match ctx.deadline() {
            Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        () = ctx.cancellation().cancelled() => Err(RunAuthzError::Canceled),
        () = deadline => Err(RunAuthzError::Canceled),
        result = fut => result,
    }
}
