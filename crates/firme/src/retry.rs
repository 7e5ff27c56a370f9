//! Single-retry policy for compound operations.
//!
//! Compound actions (click, then wait) get exactly one more attempt when the
//! first fails with a retryable error. There is no backoff and no third try.

use std::future::Future;
use tracing::info;

use crate::result::{FirmeError, FirmeResult};

/// Run `attempt`; if it fails with an error accepted by `is_retryable`, run it
/// once more and return whatever the second attempt produces.
pub async fn retry_once<T, F, Fut>(
    label: &str,
    mut attempt: F,
    is_retryable: impl Fn(&FirmeError) -> bool,
) -> FirmeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FirmeResult<T>>,
{
    match attempt().await {
        Err(e) if is_retryable(&e) => {
            info!(operation = label, error = %e, "retrying once");
            attempt().await
        }
        other => other,
    }
}
