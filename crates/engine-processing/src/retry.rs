use engine_core::{
    error::RemoteError,
    remote::timed,
    retry::{RetryDisposition, RetryError, RetryPolicy},
};
use std::{future::Future, time::Duration};

pub fn classify_remote_error(err: &RemoteError) -> RetryDisposition {
    err.disposition()
}

/// Runs a single idempotent remote call under `policy`, bounding every
/// attempt by `limit`.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    limit: Duration,
    mut op: F,
) -> Result<T, RetryError<RemoteError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    policy
        .run(move || timed(operation, limit, op()), classify_remote_error)
        .await
}
