//! Bounded exponential backoff for task store calls.

use crate::task::ports::TaskStoreError;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::{RetryIf, strategy::ExponentialBackoff};
use tracing::{debug, warn};

/// Retry settings for transient store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// A store call kept failing transiently until the attempt limit was reached.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempts: {last}")]
pub struct RetriesExhausted {
    /// Name of the store call.
    pub operation: &'static str,
    /// Number of attempts made.
    pub attempts: u32,
    /// Error returned by the final attempt.
    pub last: TaskStoreError,
}

impl RetryPolicy {
    /// Creates a policy. At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// A policy that makes a single attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delays slept between attempts: the initial backoff,
    /// doubling after each failure and capped at the maximum backoff.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + Send + 'static {
        let initial_ms = u64::try_from(self.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let cap = self.max_backoff;
        let retries = usize::try_from(self.max_attempts.saturating_sub(1)).unwrap_or(usize::MAX);
        // `from_millis(2)` yields 2, 4, 8...; scaling by the initial backoff
        // and halving gives initial, 2 * initial, 4 * initial...
        ExponentialBackoff::from_millis(2)
            .factor(initial_ms)
            .map(move |delay| (delay / 2).min(cap))
            .take(retries)
    }

    /// Runs `call`, repeating it while it fails transiently.
    ///
    /// Non-transient errors are returned immediately. When the attempts run
    /// out the last transient error is converted into a fatal one.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error, or [`TaskStoreError::Fatal`]
    /// wrapping [`RetriesExhausted`].
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, TaskStoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TaskStoreError>>,
    {
        let attempts = AtomicU32::new(0);
        let outcome = RetryIf::spawn(
            self.delays(),
            || {
                attempts.fetch_add(1, Ordering::Relaxed);
                call()
            },
            |err: &TaskStoreError| {
                let transient = err.is_transient();
                if transient {
                    warn!(
                        operation,
                        attempt = attempts.load(Ordering::Relaxed),
                        error = %err,
                        "transient store failure"
                    );
                }
                transient
            },
        )
        .await;

        match outcome {
            Err(err) if err.is_transient() => {
                let made = attempts.load(Ordering::Relaxed);
                debug!(operation, attempts = made, "retry attempts exhausted");
                Err(TaskStoreError::fatal(RetriesExhausted {
                    operation,
                    attempts: made,
                    last: err,
                }))
            }
            other => other,
        }
    }
}
