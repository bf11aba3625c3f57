//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound how long one attempt may wait for response headers
//! - Cancel the attempt cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from transport errors
//! - Only the header wait is bounded; streaming a response body is not

use std::future::Future;
use std::time::Duration;

use crate::proxy::forwarder::ForwardError;

/// Run `attempt`, failing with [`ForwardError::Timeout`] after `limit`.
pub async fn with_timeout<F, T>(limit: Duration, attempt: F) -> Result<T, ForwardError>
where
    F: Future<Output = Result<T, ForwardError>>,
{
    match tokio::time::timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => Err(ForwardError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_limit() {
        let result: Result<(), _> =
            with_timeout(Duration::from_millis(100), std::future::pending()).await;
        assert!(matches!(result, Err(ForwardError::Timeout(d)) if d == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn passes_through_inner_result() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok::<_, ForwardError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = with_timeout(Duration::from_secs(1), async {
            Err::<(), _>(ForwardError::Saturated(1))
        })
        .await;
        assert!(matches!(err, Err(ForwardError::Saturated(1))));
    }
}
