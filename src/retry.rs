//! Fixed delay retries for cluster operations.
use std::future::Future;
use std::time::Duration;

use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

use crate::remote::ClusterError;

/// Policy dictating how transient cluster errors are retried.
///
/// Only errors reporting themselves as transient via `is_transient` are
/// retried; anything else is passed straight back to the caller. Without
/// a limit, a policy will retry forever.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
    limit: Option<usize>,
}

impl RetryPolicy {
    /// Constructs a new policy from a delay and an optional attempt limit.
    pub fn new(delay: Duration, limit: Option<usize>) -> Self {
        Self { delay, limit }
    }

    /// Executes an operation until it succeeds or fails permanently.
    ///
    /// The `action` is only used to describe the operation in logs.
    pub async fn run<T, F, Fut>(&self, action: &str, mut operation: F) -> Result<T, ClusterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClusterError>>,
    {
        // the first attempt is free, the strategy only yields the retries
        let retries = self.limit.map_or(usize::MAX, |limit| limit.saturating_sub(1));
        let strategy = FixedInterval::new(self.delay).take(retries);

        let mut attempt = 0;
        let delay = self.delay.as_secs();

        let attempts = || {
            attempt += 1;

            let current = attempt;
            let pending = operation();

            async move {
                let result = pending.await;
                if let Err(err) = &result {
                    if err.is_transient() {
                        tracing::warn!(
                            "Unable to {} (attempt {}): {}, retry delay is {}s",
                            action,
                            current,
                            err,
                            delay
                        );
                    }
                }
                result
            }
        };

        RetryIf::spawn(strategy, attempts, ClusterError::is_transient).await
    }
}
