// SPDX-License-Identifier: MIT OR Apache-2.0
//! Central error-handling policy for Faultline.
//!
//! [`ErrorHandler::handle`] is the single required call for any surrounding
//! code on failure: it normalises the raised value to an
//! [`AppError`](fl_error::AppError), merges context, fans out to the error
//! logger, runs category-reaction hooks with failure isolation, and
//! dispatches notifications above the severity threshold. Retry and
//! sentinel-return wrappers are convenience layers on top of it.
//!
//! There is no hidden singleton: construct one handler at process start and
//! pass it by [`Arc`] to every call site.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod retry;

pub use cancel::{CancelToken, Canceller};
pub use retry::{RetryPolicy, retry_with_backoff};

use async_trait::async_trait;
use fl_config::{Environment, ResilienceConfig};
use fl_error::{AppError, AppErrorDto, ErrorCategory, ErrorCode, ErrorContext, ErrorSeverity};
use fl_logger::ErrorLogger;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::warn;

// ---------------------------------------------------------------------------
// HandlerConfig
// ---------------------------------------------------------------------------

/// Handler policy knobs, fixed at construction.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Whether handled errors are logged at all.
    pub log_errors: bool,
    /// Whether high/critical errors trigger notifier dispatch.
    pub notify_errors: bool,
    /// Whether contexts passed to `handle` are merged onto errors.
    pub capture_context: bool,
    /// Default retry count for [`ErrorHandler::default_retry_policy`].
    pub max_retries: u32,
    /// Default base backoff delay.
    pub retry_delay: Duration,
    /// Codes handled silently: no log, no hooks, no notification.
    pub ignored_codes: Vec<ErrorCode>,
    /// Deployment environment.
    pub environment: Environment,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            log_errors: true,
            notify_errors: true,
            capture_context: true,
            max_retries: 3,
            retry_delay: Duration::from_millis(1_000),
            ignored_codes: Vec::new(),
            environment: Environment::default(),
        }
    }
}

impl From<&ResilienceConfig> for HandlerConfig {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            log_errors: config.log_errors,
            notify_errors: config.notify_errors,
            capture_context: config.capture_context,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            ignored_codes: config.parsed_ignored_codes(),
            environment: config.environment,
        }
    }
}

// ---------------------------------------------------------------------------
// Hooks and notifiers
// ---------------------------------------------------------------------------

/// A reaction run when an error of a matching category is handled.
///
/// Hooks run concurrently with no relative-order guarantee; a hook failing
/// or panicking never affects its siblings or the caller of `handle`.
#[async_trait]
pub trait CategoryHook: Send + Sync {
    /// Stable hook name, used in failure diagnostics.
    fn name(&self) -> &str;

    /// React to a handled error.
    async fn on_error(&self, error: &AppErrorDto) -> anyhow::Result<()>;
}

/// A notification channel for high-severity errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Stable notifier name, used in failure diagnostics.
    fn name(&self) -> &str;

    /// Deliver a notification for a handled error.
    async fn notify(&self, error: &AppErrorDto) -> anyhow::Result<()>;
}

/// A hook bound to the categories it reacts to.
struct HookEntry {
    /// `None` reacts to every category.
    category: Option<ErrorCategory>,
    hook: Arc<dyn CategoryHook>,
}

/// Severity at or above which notifiers are dispatched.
const NOTIFY_THRESHOLD: ErrorSeverity = ErrorSeverity::High;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds an [`ErrorHandler`] with an explicit, ordered hook and notifier
/// list. Registration order is the listing order; dispatch is concurrent.
pub struct ErrorHandlerBuilder {
    logger: Arc<ErrorLogger>,
    config: HandlerConfig,
    hooks: Vec<HookEntry>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl ErrorHandlerBuilder {
    /// Register a hook for one category.
    pub fn on_category(
        mut self,
        category: ErrorCategory,
        hook: Arc<dyn CategoryHook>,
    ) -> Self {
        self.hooks.push(HookEntry {
            category: Some(category),
            hook,
        });
        self
    }

    /// Register a hook for every category.
    pub fn on_any(mut self, hook: Arc<dyn CategoryHook>) -> Self {
        self.hooks.push(HookEntry {
            category: None,
            hook,
        });
        self
    }

    /// Register a notification channel.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Finish construction.
    pub fn build(self) -> ErrorHandler {
        ErrorHandler {
            logger: self.logger,
            config: self.config,
            hooks: self.hooks,
            notifiers: self.notifiers,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorHandler
// ---------------------------------------------------------------------------

/// Central error dispatch. See the crate docs for the pipeline.
pub struct ErrorHandler {
    logger: Arc<ErrorLogger>,
    config: HandlerConfig,
    hooks: Vec<HookEntry>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl ErrorHandler {
    /// A handler with no hooks or notifiers.
    pub fn new(logger: Arc<ErrorLogger>, config: HandlerConfig) -> Self {
        Self::builder(logger, config).build()
    }

    /// Start building a handler with hooks and notifiers.
    pub fn builder(logger: Arc<ErrorLogger>, config: HandlerConfig) -> ErrorHandlerBuilder {
        ErrorHandlerBuilder {
            logger,
            config,
            hooks: Vec::new(),
            notifiers: Vec::new(),
        }
    }

    /// The handler's configuration.
    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// The retry policy derived from the configured defaults.
    pub fn default_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_retries, self.config.retry_delay)
    }

    /// Normalise and dispatch a raised value.
    ///
    /// The explicit `context` argument wins over whatever context the error
    /// already carries. Ignored codes return immediately with no side
    /// effects. `handle` completes only after every sink, hook, and
    /// notifier has settled; their individual failures are isolated and
    /// reported as secondary diagnostics, never to the caller.
    pub async fn handle(&self, error: anyhow::Error, context: Option<ErrorContext>) -> AppError {
        let mut err = AppError::normalize(error);

        if self.config.capture_context
            && let Some(ctx) = context
        {
            err.add_context(ctx);
        }

        if self.config.ignored_codes.contains(&err.code()) {
            return err;
        }

        if self.config.log_errors {
            self.logger.log(&err).await;
        }

        let dto = err.to_dto();
        self.run_hooks(&dto).await;

        if self.config.notify_errors && err.severity() >= NOTIFY_THRESHOLD {
            self.run_notifiers(&dto).await;
        }

        err
    }

    /// Run all hooks matching the error's category concurrently, isolating
    /// individual failures.
    async fn run_hooks(&self, dto: &AppErrorDto) {
        let mut set = JoinSet::new();
        for entry in &self.hooks {
            if entry.category.is_some_and(|c| c != dto.category) {
                continue;
            }
            let hook = entry.hook.clone();
            let dto = dto.clone();
            set.spawn(async move {
                let name = hook.name().to_owned();
                (name, hook.on_error(&dto).await)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((name, Err(err))) => {
                    warn!(hook = %name, error = %format!("{err:#}"), "reaction hook failed");
                }
                Err(join_err) => {
                    warn!(error = %join_err, "reaction hook panicked");
                }
            }
        }
    }

    /// Dispatch all notifiers concurrently, isolating individual failures.
    /// Dispatch is unthrottled.
    async fn run_notifiers(&self, dto: &AppErrorDto) {
        let mut set = JoinSet::new();
        for notifier in &self.notifiers {
            let notifier = notifier.clone();
            let dto = dto.clone();
            set.spawn(async move {
                let name = notifier.name().to_owned();
                (name, notifier.notify(&dto).await)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((name, Err(err))) => {
                    warn!(notifier = %name, error = %format!("{err:#}"), "notifier failed");
                }
                Err(join_err) => {
                    warn!(error = %join_err, "notifier panicked");
                }
            }
        }
    }

    // -- Retry wrappers ----------------------------------------------------

    /// Run `op` under `policy` with pure exponential backoff. See
    /// [`retry_with_backoff`] for the exact semantics.
    pub async fn with_retry<T, F, Fut>(&self, policy: RetryPolicy, op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        retry_with_backoff(policy, &CancelToken::never(), op).await
    }

    /// Like [`with_retry`](Self::with_retry), honouring a cancellation
    /// token during backoff waits.
    pub async fn with_retry_cancellable<T, F, Fut>(
        &self,
        policy: RetryPolicy,
        token: &CancelToken,
        op: F,
    ) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        retry_with_backoff(policy, token, op).await
    }

    // -- Sentinel wrappers ---------------------------------------------------

    /// Run an async operation; on failure, dispatch through
    /// [`handle`](Self::handle) and return `None` instead of propagating.
    /// For fire-and-forget call sites.
    pub async fn capture_async<T, Fut>(&self, op: Fut) -> Option<T>
    where
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match op.await {
            Ok(value) => Some(value),
            Err(err) => {
                self.handle(err, None).await;
                None
            }
        }
    }

    /// Run a synchronous operation; on failure, dispatch through
    /// [`handle`](Self::handle) and return `None`.
    pub async fn capture_sync<T>(&self, op: impl FnOnce() -> anyhow::Result<T>) -> Option<T> {
        match op() {
            Ok(value) => Some(value),
            Err(err) => {
                self.handle(err, None).await;
                None
            }
        }
    }

    /// A reusable sentinel-return boundary that attaches the given ambient
    /// context to every failure it captures.
    pub fn error_boundary(self: &Arc<Self>, context: ErrorContext) -> ErrorBoundary {
        ErrorBoundary {
            handler: self.clone(),
            context,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorBoundary
// ---------------------------------------------------------------------------

/// Sentinel-return wrapper carrying ambient context; see
/// [`ErrorHandler::error_boundary`].
#[derive(Clone)]
pub struct ErrorBoundary {
    handler: Arc<ErrorHandler>,
    context: ErrorContext,
}

impl ErrorBoundary {
    /// Run an operation inside the boundary.
    pub async fn run<T, Fut>(&self, op: Fut) -> Option<T>
    where
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match op.await {
            Ok(value) => Some(value),
            Err(err) => {
                self.handler.handle(err, Some(self.context.clone())).await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_logger::{ConsoleSink, ErrorSink};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ErrorSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        async fn log(&self, _entry: &AppErrorDto) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingHook {
        name: String,
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingHook {
        fn new(name: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_owned(),
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl CategoryHook for CountingHook {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_error(&self, _error: &AppErrorDto) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("hook {} failed", self.name);
            }
            Ok(())
        }
    }

    struct CountingNotifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        fn name(&self) -> &str {
            "counting"
        }

        async fn notify(&self, _error: &AppErrorDto) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn logger_with(sink: Arc<dyn ErrorSink>) -> Arc<ErrorLogger> {
        Arc::new(ErrorLogger::with_sinks(Arc::new(ConsoleSink), vec![sink]))
    }

    #[tokio::test]
    async fn handle_normalizes_foreign_errors() {
        let handler = ErrorHandler::new(Arc::new(ErrorLogger::default()), HandlerConfig::default());
        let err = handler.handle(anyhow::anyhow!("fetch failed"), None).await;
        assert_eq!(err.code(), ErrorCode::UnknownError);
        assert_eq!(err.category(), ErrorCategory::Unknown);
        assert_eq!(err.message, "fetch failed");
        assert_eq!(err.user_message(), fl_error::GENERIC_USER_MESSAGE);
    }

    #[tokio::test]
    async fn explicit_context_wins_over_ambient() {
        let handler = ErrorHandler::new(Arc::new(ErrorLogger::default()), HandlerConfig::default());
        let raised = AppError::new(ErrorCode::NetworkTimeout, "slow")
            .with_context(ErrorContext::new().with_url("/ambient").with_user_id("u-1"));
        let err = handler
            .handle(
                anyhow::Error::new(raised),
                Some(ErrorContext::new().with_url("/explicit")),
            )
            .await;
        let ctx = err.context().unwrap();
        assert_eq!(ctx.url.as_deref(), Some("/explicit"));
        assert_eq!(ctx.user_id.as_deref(), Some("u-1"));
    }

    #[tokio::test]
    async fn ignored_codes_have_no_side_effects() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
        });
        let hook = CountingHook::new("h", false);
        let notifier = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
        });
        let config = HandlerConfig {
            ignored_codes: vec![ErrorCode::OperationCancelled],
            ..Default::default()
        };
        let handler = ErrorHandler::builder(logger_with(sink.clone()), config)
            .on_any(hook.clone())
            .notifier(notifier.clone())
            .build();

        let raised = AppError::new(ErrorCode::OperationCancelled, "user backed out")
            .with_severity(ErrorSeverity::Critical);
        let err = handler.handle(anyhow::Error::new(raised), None).await;

        assert_eq!(err.code(), ErrorCode::OperationCancelled);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
        assert_eq!(hook.calls.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_hook_does_not_starve_siblings() {
        let a = CountingHook::new("a", false);
        let b = CountingHook::new("b", true);
        let c = CountingHook::new("c", false);
        let handler =
            ErrorHandler::builder(Arc::new(ErrorLogger::default()), HandlerConfig::default())
                .on_any(a.clone())
                .on_any(b.clone())
                .on_any(c.clone())
                .build();

        handler
            .handle(
                anyhow::Error::new(AppError::new(ErrorCode::SystemError, "boom")),
                None,
            )
            .await;

        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn category_hooks_only_fire_for_their_category() {
        let db_hook = CountingHook::new("db", false);
        let net_hook = CountingHook::new("net", false);
        let handler =
            ErrorHandler::builder(Arc::new(ErrorLogger::default()), HandlerConfig::default())
                .on_category(ErrorCategory::Database, db_hook.clone())
                .on_category(ErrorCategory::Network, net_hook.clone())
                .build();

        handler
            .handle(
                anyhow::Error::new(AppError::new(ErrorCode::DatabaseQueryFailed, "boom")),
                None,
            )
            .await;

        assert_eq!(db_hook.calls.load(Ordering::SeqCst), 1);
        assert_eq!(net_hook.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn notifiers_gated_on_severity() {
        let notifier = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
        });
        let handler =
            ErrorHandler::builder(Arc::new(ErrorLogger::default()), HandlerConfig::default())
                .notifier(notifier.clone())
                .build();

        // Low severity: no notification.
        handler
            .handle(
                anyhow::Error::new(AppError::new(ErrorCode::ValidationError, "bad field")),
                None,
            )
            .await;
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);

        // High severity: notified.
        handler
            .handle(
                anyhow::Error::new(AppError::new(ErrorCode::AuthInvalidCredentials, "nope")),
                None,
            )
            .await;
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);

        // Critical: notified.
        handler
            .handle(
                anyhow::Error::new(AppError::new(ErrorCode::SystemError, "down")),
                None,
            )
            .await;
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn notify_disabled_suppresses_dispatch() {
        let notifier = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
        });
        let config = HandlerConfig {
            notify_errors: false,
            ..Default::default()
        };
        let handler = ErrorHandler::builder(Arc::new(ErrorLogger::default()), config)
            .notifier(notifier.clone())
            .build();

        handler
            .handle(
                anyhow::Error::new(AppError::new(ErrorCode::SystemError, "down")),
                None,
            )
            .await;
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn capture_async_returns_sentinel_on_failure() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
        });
        let handler = ErrorHandler::new(logger_with(sink.clone()), HandlerConfig::default());

        let ok = handler.capture_async(async { Ok::<_, anyhow::Error>(7) }).await;
        assert_eq!(ok, Some(7));

        let failed: Option<i32> = handler
            .capture_async(async { Err(anyhow::anyhow!("nope")) })
            .await;
        assert_eq!(failed, None);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn capture_sync_returns_sentinel_on_failure() {
        let handler = ErrorHandler::new(Arc::new(ErrorLogger::default()), HandlerConfig::default());
        let failed: Option<i32> = handler.capture_sync(|| anyhow::bail!("nope")).await;
        assert_eq!(failed, None);
        let ok = handler.capture_sync(|| Ok(1)).await;
        assert_eq!(ok, Some(1));
    }

    #[tokio::test]
    async fn error_boundary_attaches_its_context() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
        });
        let handler = Arc::new(ErrorHandler::new(
            logger_with(sink.clone()),
            HandlerConfig::default(),
        ));
        let boundary = handler.error_boundary(ErrorContext::new().with_url("/flashcards"));

        let missing: Option<()> = boundary.run(async { anyhow::bail!("deck gone") }).await;
        assert_eq!(missing, None);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn config_from_resilience_config() {
        let rc = ResilienceConfig {
            max_retries: 9,
            retry_delay_ms: 50,
            ignored_codes: vec!["NETWORK_OFFLINE".into()],
            ..Default::default()
        };
        let hc = HandlerConfig::from(&rc);
        assert_eq!(hc.max_retries, 9);
        assert_eq!(hc.retry_delay, Duration::from_millis(50));
        assert_eq!(hc.ignored_codes, vec![ErrorCode::NetworkOffline]);
    }
}
