// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured failure model for the Faultline resilience framework.
//!
//! Every failure in the platform is normalised to an [`AppError`]: a stable
//! [`ErrorCode`], the [`ErrorCategory`]/[`ErrorSeverity`] policy derived
//! from it, retryability and user-visibility flags, an optional causal
//! chain, and optional request [`ErrorContext`]. Construct errors fluently:
//!
//! ```
//! use fl_error::{AppError, ErrorCode, ErrorSeverity};
//!
//! let err = AppError::new(ErrorCode::DatabaseQueryFailed, "deck lookup failed")
//!     .with_severity(ErrorSeverity::Critical);
//! assert!(err.is_retryable());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod code;
mod context;

pub use code::{
    ALL_CATEGORIES, ALL_CODES, ALL_SEVERITIES, CategoryDefaults, ErrorCategory, ErrorCode,
    ErrorSeverity, GENERIC_USER_MESSAGE, UnknownCode,
};
pub use context::ErrorContext;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// FieldViolation
// ---------------------------------------------------------------------------

/// A single failed validation check, surfaced verbatim at the wire boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Name of the offending field.
    pub field: String,
    /// What was wrong with it.
    pub message: String,
    /// Stable code for the specific check that failed.
    pub code: ErrorCode,
}

impl FieldViolation {
    /// Create a violation record.
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorMetadata
// ---------------------------------------------------------------------------

/// Policy metadata owned by exactly one [`AppError`].
///
/// `code` is immutable after construction; the remaining policy fields are
/// seeded from the per-category default table and may only be overridden at
/// construction time via the [`AppError`] builder.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMetadata {
    code: ErrorCode,
    category: ErrorCategory,
    severity: ErrorSeverity,
    retryable: bool,
    user_friendly: bool,
    context: Option<ErrorContext>,
}

impl ErrorMetadata {
    fn for_code(code: ErrorCode) -> Self {
        let defaults = code.category().defaults();
        Self {
            code,
            category: code.category(),
            severity: defaults.severity,
            retryable: defaults.retryable,
            user_friendly: defaults.user_friendly,
            context: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// The canonical structured failure value.
pub struct AppError {
    /// Human-readable description of what failed.
    pub message: String,
    metadata: ErrorMetadata,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    validation_errors: Vec<FieldViolation>,
}

impl AppError {
    /// Create an error with the given code; policy fields come from the
    /// code's category defaults.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            metadata: ErrorMetadata::for_code(code),
            source: None,
            validation_errors: Vec::new(),
        }
    }

    /// Wrap a foreign error under the given code, preserving its message and
    /// chaining it as the cause.
    pub fn from_error(
        code: ErrorCode,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        let message = source.to_string();
        Self::new(code, message).with_source(source)
    }

    /// Normalise an arbitrary raised value. An [`AppError`] passes through
    /// untouched; anything else becomes `UNKNOWN_ERROR` with its message
    /// preserved on the diagnostic side and the original chained as the
    /// cause. Foreign messages are never user-friendly: we cannot know what
    /// they contain, so end users get the generic fallback.
    pub fn normalize(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => {
                let message = other.to_string();
                let mut normalized =
                    Self::new(ErrorCode::UnknownError, message).with_user_friendly(false);
                normalized.source = Some(other.into());
                normalized
            }
        }
    }

    // -- Construction-time overrides -------------------------------------

    /// Override the default severity.
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.metadata.severity = severity;
        self
    }

    /// Override the default retryability.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.metadata.retryable = retryable;
        self
    }

    /// Override whether the raw message may be shown to end users.
    pub fn with_user_friendly(mut self, user_friendly: bool) -> Self {
        self.metadata.user_friendly = user_friendly;
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Record a failed validation check.
    pub fn with_violation(mut self, violation: FieldViolation) -> Self {
        self.validation_errors.push(violation);
        self
    }

    // -- Context ----------------------------------------------------------

    /// Merge `context` into this error (field-wise last-write-wins, see
    /// [`ErrorContext::merged_with`]).
    pub fn add_context(&mut self, context: ErrorContext) {
        self.metadata.context = Some(match self.metadata.context.take() {
            Some(prior) => prior.merged_with(context),
            None => context,
        });
    }

    /// Builder form of [`add_context`](Self::add_context).
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.add_context(context);
        self
    }

    // -- Accessors ----------------------------------------------------------

    /// The stable error code.
    pub fn code(&self) -> ErrorCode {
        self.metadata.code
    }

    /// The failure category.
    pub fn category(&self) -> ErrorCategory {
        self.metadata.category
    }

    /// The escalation level.
    pub fn severity(&self) -> ErrorSeverity {
        self.metadata.severity
    }

    /// Whether retrying the failed operation unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        self.metadata.retryable
    }

    /// Whether the raw message is safe for end users.
    pub fn is_user_friendly(&self) -> bool {
        self.metadata.user_friendly
    }

    /// The attached diagnostic context, if any.
    pub fn context(&self) -> Option<&ErrorContext> {
        self.metadata.context.as_ref()
    }

    /// Recorded validation violations.
    pub fn validation_errors(&self) -> &[FieldViolation] {
        &self.validation_errors
    }

    /// The message safe to show an end user. Uses the raw message when the
    /// error is user-friendly, otherwise the fixed per-code hint, otherwise
    /// a generic fallback. Idempotent; never leaks internals.
    pub fn user_message(&self) -> &str {
        if self.metadata.user_friendly {
            &self.message
        } else {
            self.metadata.code.user_hint().unwrap_or(GENERIC_USER_MESSAGE)
        }
    }

    /// Stable serialisable snapshot of this error.
    pub fn to_dto(&self) -> AppErrorDto {
        AppErrorDto {
            code: self.metadata.code,
            category: self.metadata.category,
            severity: self.metadata.severity,
            retryable: self.metadata.retryable,
            user_friendly: self.metadata.user_friendly,
            message: self.message.clone(),
            timestamp: self
                .metadata
                .context
                .as_ref()
                .map(|c| c.timestamp)
                .unwrap_or_else(Utc::now),
            context: self.metadata.context.clone(),
            validation_errors: self.validation_errors.clone(),
            source_message: self.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("AppError");
        d.field("code", &self.metadata.code);
        d.field("category", &self.metadata.category);
        d.field("severity", &self.metadata.severity);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.validation_errors.is_empty() {
            d.field("validation_errors", &self.validation_errors);
        }
        d.finish()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.metadata.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// AppErrorDto
// ---------------------------------------------------------------------------

/// Serialisable snapshot of an [`AppError`] (without the opaque source).
///
/// The timestamp serialises as ISO-8601. `code`, `category`, `severity`,
/// `retryable`, and `user_friendly` round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppErrorDto {
    /// Stable error code.
    pub code: ErrorCode,
    /// Failure category.
    pub category: ErrorCategory,
    /// Escalation level.
    pub severity: ErrorSeverity,
    /// Retryability flag.
    pub retryable: bool,
    /// User-visibility flag.
    pub user_friendly: bool,
    /// Human-readable message.
    pub message: String,
    /// When the failure (context) was captured.
    pub timestamp: DateTime<Utc>,
    /// Diagnostic context, if attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
    /// Validation violations, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<FieldViolation>,
    /// String form of the causal chain head, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}
