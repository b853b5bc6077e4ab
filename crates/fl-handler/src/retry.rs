// SPDX-License-Identifier: MIT OR Apache-2.0
//! Retry with pure exponential backoff.

use crate::cancel::CancelToken;
use fl_error::{AppError, ErrorCode};
use std::future::Future;
use std::time::Duration;

/// How many times to retry and how long to wait between attempts.
///
/// The wait before retry number `n` (zero-based) is `base_delay << n` — pure
/// exponential backoff, no jitter. Total attempts are `max_retries + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// The backoff delay after the given zero-based failed attempt.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

/// Run `op` under `policy`, retrying only while attempts remain **and** the
/// last error was retryable. The final error is returned unmodified.
///
/// A cancellation arriving during a backoff wait aborts the loop with
/// `OPERATION_CANCELLED`, chaining the error that triggered the backoff.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    token: &CancelToken,
    mut op: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries || !err.is_retryable() {
                    return Err(err);
                }
                let delay = policy.backoff_delay(attempt);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = token.cancelled() => {
                        return Err(AppError::new(
                            ErrorCode::OperationCancelled,
                            "operation cancelled while waiting to retry",
                        )
                        .with_source(err));
                    }
                }
                attempt += 1;
            }
        }
    }
}
