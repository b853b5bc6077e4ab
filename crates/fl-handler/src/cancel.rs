// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cancellation signal plumbed through retry backoffs and operation state.
//!
//! A pending backoff sleep or in-flight retry loop must stop when its owner
//! goes away; the owner holds a [`Canceller`] and hands clones of the
//! [`CancelToken`] to everything it may want to abandon.

use std::sync::Arc;
use tokio::sync::watch;

/// Owning side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct Canceller {
    tx: Arc<watch::Sender<bool>>,
}

impl Canceller {
    /// Fire the signal. Idempotent; all token clones observe it.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observing side of a cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
    // Present only on never-firing tokens, to keep the channel open.
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

impl CancelToken {
    /// Create a connected `(Canceller, CancelToken)` pair.
    pub fn new() -> (Canceller, CancelToken) {
        let (tx, rx) = watch::channel(false);
        let tx = Arc::new(tx);
        (
            Canceller { tx: tx.clone() },
            CancelToken {
                rx,
                _keepalive: None,
            },
        )
    }

    /// A token that never fires, for call sites without an owner to abandon
    /// them.
    pub fn never() -> CancelToken {
        let (tx, rx) = watch::channel(false);
        CancelToken {
            rx,
            _keepalive: Some(Arc::new(tx)),
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when cancellation is requested. If the [`Canceller`] has been
    /// dropped without firing, this pends forever.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without firing: cancellation can never arrive.
                std::future::pending::<()>().await;
            }
        }
    }
}
