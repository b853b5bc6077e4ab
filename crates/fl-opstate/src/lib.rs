// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-operation state machine for client-side async work.
//!
//! An [`Operation`] tracks one logical fetch-or-mutate through
//! `Idle → Loading → {Success, Failed}`, owns its retry loop, and reports
//! every failure to the central [`ErrorHandler`]. A monotonically increasing
//! generation counter guards against overlapping `execute` calls: only the
//! newest in-flight attempt may write its completion back, so a stale
//! response can never overwrite fresher state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use fl_error::{AppError, ErrorCode};
use fl_handler::{CancelToken, Canceller, ErrorHandler, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

// ---------------------------------------------------------------------------
// OperationPhase
// ---------------------------------------------------------------------------

/// The phase of an [`Operation`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationPhase {
    /// Nothing has run yet, or the last outcome was cleared.
    Idle,
    /// An attempt is in flight.
    Loading,
    /// The last attempt produced a value.
    Success,
    /// The last attempt failed after any retries.
    Failed,
}

impl OperationPhase {
    /// Returns `true` if this phase represents a settled outcome.
    ///
    /// Terminal phases are still re-enterable: `execute` restarts from
    /// `Success` or `Failed`, and `clear_error` returns them to `Idle`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Returns the set of phases that are valid successors of `self`.
    pub fn valid_transitions(&self) -> &'static [OperationPhase] {
        match self {
            Self::Idle => &[Self::Loading],
            Self::Loading => &[Self::Success, Self::Failed],
            Self::Success | Self::Failed => &[Self::Loading, Self::Idle],
        }
    }

    /// Returns `true` if transitioning from `self` to `next` is valid.
    pub fn can_transition_to(&self, next: OperationPhase) -> bool {
        self.valid_transitions().contains(&next)
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// A point-in-time view of an operation's state.
#[derive(Clone, Debug)]
pub struct OperationSnapshot<T> {
    /// Current phase.
    pub phase: OperationPhase,
    /// Payload of the last success, retained while a reload is in flight.
    pub data: Option<T>,
    /// Error of the last failure.
    pub error: Option<Arc<AppError>>,
    /// Failed attempts recorded by `execute_with_retry` since the last
    /// success or `clear_error`.
    pub retry_count: u32,
}

struct Inner<T> {
    phase: OperationPhase,
    data: Option<T>,
    error: Option<Arc<AppError>>,
    retry_count: u32,
    // Bumped by every execute/cancel; a completion only applies if the
    // generation it captured is still current.
    generation: u64,
    canceller: Canceller,
    token: CancelToken,
}

impl<T> Inner<T> {
    /// Move to `Loading` and claim a fresh generation.
    fn begin(&mut self) -> (u64, CancelToken) {
        self.generation += 1;
        self.phase = OperationPhase::Loading;
        (self.generation, self.token.clone())
    }
}

/// Shared state cell driving one logical async operation.
///
/// Cloning shares the cell; all clones observe the same phase, payload, and
/// generation counter.
pub struct Operation<T> {
    inner: Arc<RwLock<Inner<T>>>,
    handler: Arc<ErrorHandler>,
}

impl<T> Clone for Operation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Operation<T> {
    /// A new operation in `Idle`, reporting failures to `handler`.
    pub fn new(handler: Arc<ErrorHandler>) -> Self {
        let (canceller, token) = CancelToken::new();
        Self {
            inner: Arc::new(RwLock::new(Inner {
                phase: OperationPhase::Idle,
                data: None,
                error: None,
                retry_count: 0,
                generation: 0,
                canceller,
                token,
            })),
            handler,
        }
    }

    /// Current phase.
    pub async fn phase(&self) -> OperationPhase {
        self.inner.read().await.phase
    }

    /// Failed attempts since the last success or `clear_error`.
    pub async fn retry_count(&self) -> u32 {
        self.inner.read().await.retry_count
    }

    /// Error of the last failure, if the operation is in `Failed`.
    pub async fn error(&self) -> Option<Arc<AppError>> {
        self.inner.read().await.error.clone()
    }

    /// Run `op` once: `{Idle, Success, Failed} → Loading`, then `Success`
    /// with the value or `Failed` with the normalized error.
    ///
    /// The failure is dispatched through [`ErrorHandler::handle`] before the
    /// state settles; `retry_count` is left unchanged. If a newer `execute`
    /// (or a cancel) claimed the cell in the meantime, the completion is
    /// dropped and the newer state stands.
    pub async fn execute<F, Fut>(&self, op: F) -> Result<(), Arc<AppError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let (generation, _token) = self.inner.write().await.begin();

        match op().await {
            Ok(value) => {
                let mut inner = self.inner.write().await;
                if inner.generation == generation {
                    inner.phase = OperationPhase::Success;
                    inner.data = Some(value);
                    inner.error = None;
                    inner.retry_count = 0;
                } else {
                    debug!(generation, "stale completion dropped");
                }
                Ok(())
            }
            Err(err) => {
                let handled = Arc::new(self.handler.handle(err, None).await);
                let mut inner = self.inner.write().await;
                if inner.generation == generation {
                    inner.phase = OperationPhase::Failed;
                    inner.error = Some(handled.clone());
                } else {
                    debug!(generation, "stale failure dropped");
                }
                Err(handled)
            }
        }
    }

    /// Run `op` under `policy`, staying in `Loading` across backoff waits.
    ///
    /// Every failed attempt increments `retry_count`; the loop continues
    /// only while attempts remain and the error is retryable, with the same
    /// exponential backoff as the handler's retry wrapper. On exhaustion the
    /// final error is dispatched through [`ErrorHandler::handle`] and the
    /// operation settles in `Failed`. A cancel during a backoff wait settles
    /// in `Failed` with `OPERATION_CANCELLED`, chaining the triggering
    /// error. Superseded attempts stop without touching state.
    pub async fn execute_with_retry<F, Fut>(
        &self,
        policy: RetryPolicy,
        mut op: F,
    ) -> Result<(), Arc<AppError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let (generation, token) = self.inner.write().await.begin();

        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => {
                    let mut inner = self.inner.write().await;
                    if inner.generation == generation {
                        inner.phase = OperationPhase::Success;
                        inner.data = Some(value);
                        inner.error = None;
                        inner.retry_count = 0;
                    } else {
                        debug!(generation, "stale completion dropped");
                    }
                    return Ok(());
                }
                Err(err) => {
                    let err = AppError::normalize(err);
                    {
                        let mut inner = self.inner.write().await;
                        if inner.generation != generation {
                            debug!(generation, "superseded retry loop stopped");
                            return Err(Arc::new(err));
                        }
                        inner.retry_count += 1;
                    }
                    if attempt >= policy.max_retries || !err.is_retryable() {
                        return Err(self.settle_failed(generation, err).await);
                    }
                    let delay = policy.backoff_delay(attempt);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = token.cancelled() => {
                            let cancelled = AppError::new(
                                ErrorCode::OperationCancelled,
                                "operation cancelled while waiting to retry",
                            )
                            .with_source(err);
                            return Err(self.settle_failed(generation, cancelled).await);
                        }
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Dispatch the final error through the handler and settle in `Failed`
    /// if this attempt is still current.
    async fn settle_failed(&self, generation: u64, err: AppError) -> Arc<AppError> {
        let handled = Arc::new(self.handler.handle(anyhow::Error::new(err), None).await);
        let mut inner = self.inner.write().await;
        if inner.generation == generation {
            inner.phase = OperationPhase::Failed;
            inner.error = Some(handled.clone());
        } else {
            debug!(generation, "stale failure dropped");
        }
        handled
    }

    /// `{Failed, Success} → Idle`: drop the payload and error and reset
    /// `retry_count`. A no-op while `Loading` or already `Idle`; returns
    /// whether the reset applied.
    pub async fn clear_error(&self) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.phase.is_terminal() {
            return false;
        }
        inner.generation += 1;
        inner.phase = OperationPhase::Idle;
        inner.data = None;
        inner.error = None;
        inner.retry_count = 0;
        true
    }

    /// Cancel the in-flight attempt, if any.
    ///
    /// Fires the cancellation signal (aborting any pending backoff wait),
    /// invalidates the current generation, and settles a `Loading` operation
    /// in `Failed` with `OPERATION_CANCELLED`. The signal is re-armed so a
    /// later `execute` starts fresh.
    pub async fn cancel(&self) {
        let mut inner = self.inner.write().await;
        inner.canceller.cancel();
        let (canceller, token) = CancelToken::new();
        inner.canceller = canceller;
        inner.token = token;
        inner.generation += 1;
        if inner.phase == OperationPhase::Loading {
            inner.phase = OperationPhase::Failed;
            inner.error = Some(Arc::new(AppError::new(
                ErrorCode::OperationCancelled,
                "operation cancelled by owner",
            )));
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Operation<T> {
    /// Point-in-time copy of the full state.
    pub async fn snapshot(&self) -> OperationSnapshot<T> {
        let inner = self.inner.read().await;
        OperationSnapshot {
            phase: inner.phase,
            data: inner.data.clone(),
            error: inner.error.clone(),
            retry_count: inner.retry_count,
        }
    }
}
