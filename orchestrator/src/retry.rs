//! Retry harness for control-plane calls
//!
//! Wraps a fallible async operation with deadline-aware exponential backoff.
//! Only errors whose textual signature matches a known transient class are
//! retried; everything else short-circuits to the caller.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::OrchestratorError;

/// Retry policy for facade calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of invocations
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each subsequent retry
    pub base_delay: Duration,

    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Textual signatures of transient control-plane failures
const RETRYABLE_SIGNATURES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequests",
    "RequestTimeout",
    "ServiceUnavailable",
    "service unavailable",
    "connection reset",
    "connection refused",
    "timed out",
];

/// Whether an error should be retried
pub fn is_retryable(err: &OrchestratorError) -> bool {
    let message = err.to_string();
    RETRYABLE_SIGNATURES.iter().any(|sig| message.contains(sig))
}

/// Run `op` with exponential backoff under `policy`.
///
/// Invokes `op` at least once and at most `policy.max_attempts` times. A
/// backoff wait that would cross `deadline` returns the last error without
/// retrying; cancellation abandons the wait immediately.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    deadline: Option<Instant>,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, OrchestratorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OrchestratorError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }

        if attempt >= max_attempts {
            return Err(OrchestratorError::RetryExhausted {
                attempts: attempt,
                message: err.to_string(),
            });
        }

        let exponent = 2u32.saturating_pow(attempt - 1);
        let delay = policy.base_delay.saturating_mul(exponent).min(policy.max_delay);

        if let Some(deadline) = deadline {
            if Instant::now() + delay >= deadline {
                debug!("retry delay {:?} would exceed the deadline, giving up", delay);
                return Err(err);
            }
        }

        debug!("attempt {} failed ({}), retrying in {:?}", attempt, err, delay);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
        }
    }
}
