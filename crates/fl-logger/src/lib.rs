// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fan-out error logging for Faultline.
//!
//! An [`ErrorLogger`] dispatches each error to every registered
//! [`ErrorSink`] on its own task and joins them all: one sink failing —
//! returning an error or panicking outright — never prevents the others
//! from running, and [`ErrorLogger::log`] itself never fails. Per-sink
//! failures are reported to a baseline fallback sink only.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use fl_error::{AppError, AppErrorDto, ErrorCode};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::warn;

// ---------------------------------------------------------------------------
// ErrorSink
// ---------------------------------------------------------------------------

/// An independent destination for logged errors.
///
/// Implementations must be cheap to clone behind an `Arc` and tolerate
/// concurrent calls; the logger gives no ordering guarantee between sinks.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    /// Stable sink name, used for registry removal and failure reports.
    fn name(&self) -> &str;

    /// Record one error. Errors returned here are isolated by the logger.
    async fn log(&self, entry: &AppErrorDto) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Collaborator interfaces
// ---------------------------------------------------------------------------

/// Write-only persistence collaborator consumed by [`PersistentSink`].
///
/// The framework never reads error records back; storage is an external
/// concern behind this trait.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one JSON log entry.
    async fn append(&self, entry: serde_json::Value) -> anyhow::Result<()>;
}

/// External telemetry collaborator consumed by [`TelemetrySink`].
#[async_trait]
pub trait TelemetryClient: Send + Sync {
    /// Forward one error snapshot to the telemetry backend.
    async fn capture(&self, entry: &AppErrorDto) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Built-in sinks
// ---------------------------------------------------------------------------

/// Baseline sink that emits structured [`tracing`] events. Active in every
/// environment; also the default fallback for sink-failure reports.
#[derive(Debug, Default, Clone)]
pub struct ConsoleSink;

#[async_trait]
impl ErrorSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn log(&self, entry: &AppErrorDto) -> anyhow::Result<()> {
        tracing::error!(
            error.code = entry.code.as_str(),
            error.category = %entry.category,
            error.severity = %entry.severity,
            error.retryable = entry.retryable,
            message = %entry.message,
            "error recorded"
        );
        Ok(())
    }
}

/// Sink that appends one JSON line per error to a [`LogStore`].
pub struct PersistentSink {
    store: Arc<dyn LogStore>,
}

impl PersistentSink {
    /// Wrap a log store.
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ErrorSink for PersistentSink {
    fn name(&self) -> &str {
        "persistent"
    }

    async fn log(&self, entry: &AppErrorDto) -> anyhow::Result<()> {
        self.store.append(serde_json::to_value(entry)?).await
    }
}

/// Sink that forwards errors to an external [`TelemetryClient`].
pub struct TelemetrySink {
    client: Arc<dyn TelemetryClient>,
}

impl TelemetrySink {
    /// Wrap a telemetry client.
    pub fn new(client: Arc<dyn TelemetryClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ErrorSink for TelemetrySink {
    fn name(&self) -> &str {
        "telemetry"
    }

    async fn log(&self, entry: &AppErrorDto) -> anyhow::Result<()> {
        self.client.capture(entry).await
    }
}

// ---------------------------------------------------------------------------
// ErrorLogger
// ---------------------------------------------------------------------------

/// Fan-out dispatcher over a registry of [`ErrorSink`]s.
///
/// The registry keeps stable insertion order for listing purposes; dispatch
/// itself is concurrent with no relative-order guarantee between sinks.
pub struct ErrorLogger {
    sinks: RwLock<Vec<Arc<dyn ErrorSink>>>,
    fallback: Arc<dyn ErrorSink>,
}

impl Default for ErrorLogger {
    fn default() -> Self {
        Self::new(Arc::new(ConsoleSink))
    }
}

impl ErrorLogger {
    /// Create a logger with no registered sinks and the given fallback.
    pub fn new(fallback: Arc<dyn ErrorSink>) -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
            fallback,
        }
    }

    /// Create a logger with an initial, ordered sink list.
    pub fn with_sinks(fallback: Arc<dyn ErrorSink>, sinks: Vec<Arc<dyn ErrorSink>>) -> Self {
        Self {
            sinks: RwLock::new(sinks),
            fallback,
        }
    }

    /// Register a sink at the end of the registry.
    pub async fn add_sink(&self, sink: Arc<dyn ErrorSink>) {
        self.sinks.write().await.push(sink);
    }

    /// Remove the first sink with the given name. Returns whether one was
    /// removed.
    pub async fn remove_sink(&self, name: &str) -> bool {
        let mut sinks = self.sinks.write().await;
        match sinks.iter().position(|s| s.name() == name) {
            Some(idx) => {
                sinks.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Names of all registered sinks, in registration order.
    pub async fn sink_names(&self) -> Vec<String> {
        self.sinks
            .read()
            .await
            .iter()
            .map(|s| s.name().to_owned())
            .collect()
    }

    /// Dispatch `error` to every registered sink and wait for all of them
    /// to settle. Never fails: per-sink errors and panics are caught and
    /// reported to the fallback sink only.
    pub async fn log(&self, error: &AppError) {
        let entry = error.to_dto();
        let sinks: Vec<Arc<dyn ErrorSink>> = self.sinks.read().await.clone();

        let mut set = JoinSet::new();
        for sink in sinks {
            let entry = entry.clone();
            set.spawn(async move {
                let name = sink.name().to_owned();
                (name.clone(), sink.log(&entry).await)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((name, Err(err))) => {
                    self.report_sink_failure(&name, &format!("{err:#}")).await;
                }
                Err(join_err) => {
                    self.report_sink_failure("<unknown>", &join_err.to_string())
                        .await;
                }
            }
        }
    }

    /// Report a sink failure to the fallback sink; if the fallback itself
    /// fails, the report is dropped with a warning.
    async fn report_sink_failure(&self, sink_name: &str, detail: &str) {
        let report = AppError::new(
            ErrorCode::SystemError,
            format!("error sink '{sink_name}' failed: {detail}"),
        )
        .to_dto();
        if let Err(err) = self.fallback.log(&report).await {
            warn!(sink = sink_name, error = %err, "fallback sink failed; report dropped");
        }
    }
}
