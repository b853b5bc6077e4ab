// SPDX-License-Identifier: MIT OR Apache-2.0
//! Client operation state machine wired to a real handler: phase
//! transitions, retry accounting, and one-shot failure reporting.

use async_trait::async_trait;
use faultline::error::{AppError, AppErrorDto, ErrorCode};
use faultline::handler::{ErrorHandler, HandlerConfig, RetryPolicy};
use faultline::logger::{ConsoleSink, ErrorLogger, ErrorSink};
use faultline::opstate::{Operation, OperationPhase};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<AppErrorDto>>,
}

#[async_trait]
impl ErrorSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn log(&self, entry: &AppErrorDto) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

fn wire() -> (Arc<ErrorHandler>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let logger = Arc::new(ErrorLogger::with_sinks(
        Arc::new(ConsoleSink),
        vec![sink.clone()],
    ));
    let handler = Arc::new(ErrorHandler::new(logger, HandlerConfig::default()));
    (handler, sink)
}

#[tokio::test]
async fn lifecycle_idle_loading_success() {
    let (handler, sink) = wire();
    let op: Operation<Vec<String>> = Operation::new(handler);

    assert_eq!(op.phase().await, OperationPhase::Idle);
    op.execute(|| async { Ok(vec!["card one".to_owned()]) })
        .await
        .unwrap();

    let snap = op.snapshot().await;
    assert_eq!(snap.phase, OperationPhase::Success);
    assert_eq!(snap.data.unwrap().len(), 1);
    assert!(sink.seen.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_the_final_error_once() {
    let (handler, sink) = wire();
    let op: Operation<()> = Operation::new(handler);
    let calls = Arc::new(AtomicU32::new(0));
    let calls_in = calls.clone();
    let policy = RetryPolicy::new(2, Duration::from_millis(10));

    let err = op
        .execute_with_retry(policy, move || {
            let calls = calls_in.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::Error::new(AppError::new(
                    ErrorCode::NetworkServerError,
                    "sync endpoint 502",
                )))
            }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(err.code(), ErrorCode::NetworkServerError);
    assert_eq!(op.retry_count().await, 3);
    assert_eq!(op.phase().await, OperationPhase::Failed);

    // Intermediate attempts are not reported; only the settled failure is.
    let seen = sink.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].code, ErrorCode::NetworkServerError);
}

#[tokio::test]
async fn clear_error_rearms_the_machine() {
    let (handler, _sink) = wire();
    let op: Operation<&'static str> = Operation::new(handler);

    op.execute(|| async { Err(anyhow::anyhow!("deck fetch failed")) })
        .await
        .unwrap_err();
    assert_eq!(op.phase().await, OperationPhase::Failed);

    assert!(op.clear_error().await);
    assert_eq!(op.phase().await, OperationPhase::Idle);

    op.execute(|| async { Ok("recovered") }).await.unwrap();
    assert_eq!(op.snapshot().await.data, Some("recovered"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_executes_keep_the_newest_result() {
    let (handler, _sink) = wire();
    let op: Operation<&'static str> = Operation::new(handler);

    let stale = op.execute(|| async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok("stale deck list")
    });
    let fresh = op.execute(|| async { Ok("fresh deck list") });

    let (stale_result, fresh_result) = tokio::join!(stale, fresh);
    stale_result.unwrap();
    fresh_result.unwrap();

    assert_eq!(op.snapshot().await.data, Some("fresh deck list"));
}
