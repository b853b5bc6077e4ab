// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wire-boundary error translation for Faultline HTTP services.
//!
//! Route handlers return `Result<_, `[`WireError`]`>`; the
//! [`error_boundary_middleware`] turns any failure into the platform's
//! response envelope. The failing error is handed to the central
//! [`ErrorHandler`](fl_handler::ErrorHandler) on a detached task, so
//! side-effect dispatch never delays the response.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod context;

pub use context::{RequestContext, request_context_middleware, request_logger};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use fl_error::{AppError, ErrorCategory, ErrorCode, ErrorSeverity, FieldViolation};
use fl_handler::ErrorHandler;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WireError
// ---------------------------------------------------------------------------

/// The error type route handlers return.
///
/// Its `IntoResponse` impl does not build the envelope itself; it stashes
/// the error in a response extension for [`error_boundary_middleware`] to
/// translate. Without the boundary layer the client sees a bare 500 — safe,
/// if unhelpful.
#[derive(Debug)]
pub struct WireError(pub AppError);

impl From<AppError> for WireError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<anyhow::Error> for WireError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => Self(app),
            Err(other) => {
                // Unclassified foreign failure escaping a handler.
                let message = other.to_string();
                let mut app = AppError::new(ErrorCode::ApiError, message)
                    .with_severity(ErrorSeverity::High);
                app = app.with_source(BoxedCause(other.into()));
                Self(app)
            }
        }
    }
}

/// Adapter so an `anyhow::Error` can sit on a std error chain.
#[derive(Debug)]
struct BoxedCause(Box<dyn std::error::Error + Send + Sync>);

impl std::fmt::Display for BoxedCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for BoxedCause {}

/// Response extension carrying the stashed error across the middleware hop.
#[derive(Clone)]
struct StashedError(Arc<AppError>);

impl IntoResponse for WireError {
    fn into_response(self) -> Response {
        let mut resp = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        resp.extensions_mut().insert(StashedError(Arc::new(self.0)));
        resp
    }
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// Top-level error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always `false` on this path.
    pub success: bool,
    /// The failure description.
    pub error: ErrorBody,
}

/// The `error` object of the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Stable error code.
    pub code: ErrorCode,
    /// Failure message, internals-safe outside development.
    pub message: String,
    /// Message intended for direct display to the end user.
    pub user_message: String,
    /// When the failure was recorded (ISO-8601).
    pub timestamp: DateTime<Utc>,
    /// Correlation id for support and log lookup.
    pub request_id: String,
    /// Extra detail: validation violations, or internals in development.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// The `details` field: exactly one of the two shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", untagged)]
pub enum ErrorDetails {
    /// Per-field validation failures; safe in every environment.
    Validation {
        /// The failed checks.
        #[serde(rename = "validationErrors")]
        validation_errors: Vec<FieldViolation>,
    },
    /// Diagnostic internals; development only.
    #[serde(rename_all = "camelCase")]
    Internal {
        /// Causal chain, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        /// Failure category.
        category: ErrorCategory,
        /// Escalation level.
        severity: ErrorSeverity,
        /// Retryability flag.
        retryable: bool,
    },
}

// ---------------------------------------------------------------------------
// Boundary
// ---------------------------------------------------------------------------

/// Shared state for the boundary middleware.
#[derive(Clone)]
pub struct Boundary {
    handler: Arc<ErrorHandler>,
    expose_internals: bool,
}

impl Boundary {
    /// Create boundary state; internals exposure follows the handler's
    /// configured environment.
    pub fn new(handler: Arc<ErrorHandler>) -> Self {
        let expose_internals = handler.config().environment.expose_internals();
        Self {
            handler,
            expose_internals,
        }
    }

    /// Build the wire response for a failure raised while serving `ctx`.
    fn translate(&self, mut err: AppError, ctx: Option<&RequestContext>) -> Response {
        let request_id = ctx
            .map(|c| c.request_id)
            .unwrap_or_else(Uuid::new_v4)
            .to_string();

        if let Some(ctx) = ctx {
            err.add_context(ctx.to_error_context());
        }

        let dto = err.to_dto();
        let status = StatusCode::from_u16(dto.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let details = if dto.category == ErrorCategory::Validation {
            Some(ErrorDetails::Validation {
                validation_errors: dto.validation_errors.clone(),
            })
        } else if self.expose_internals {
            Some(ErrorDetails::Internal {
                stack: dto.source_message.clone(),
                category: dto.category,
                severity: dto.severity,
                retryable: dto.retryable,
            })
        } else {
            None
        };

        let user_message = err.user_message().to_owned();
        let message = if self.expose_internals || dto.user_friendly {
            dto.message.clone()
        } else {
            user_message.clone()
        };

        let envelope = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: dto.code,
                message,
                user_message,
                timestamp: dto.timestamp,
                request_id: request_id.clone(),
                details,
            },
        };

        // Side-effect dispatch is best-effort and must not delay the
        // response.
        let handler = self.handler.clone();
        tokio::spawn(async move {
            handler.handle(anyhow::Error::new(err), None).await;
        });

        let mut resp = (status, axum::Json(envelope)).into_response();
        let headers = resp.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }
        headers.insert(
            "x-error-code",
            HeaderValue::from_static(dto.code.as_str()),
        );
        resp
    }
}

/// Axum middleware translating stashed [`WireError`]s into the response
/// envelope. Layer it outside the routes and inside
/// [`request_context_middleware`].
pub async fn error_boundary_middleware(
    State(boundary): State<Boundary>,
    req: Request,
    next: Next,
) -> Response {
    let ctx = req.extensions().get::<RequestContext>().cloned();

    let mut resp = next.run(req).await;

    let Some(stashed) = resp.extensions_mut().remove::<StashedError>() else {
        return resp;
    };
    let err = match Arc::try_unwrap(stashed.0) {
        Ok(err) => err,
        // Someone cloned the extension; rebuild from the snapshot.
        Err(shared) => {
            let dto = shared.to_dto();
            AppError::new(dto.code, dto.message)
                .with_severity(dto.severity)
                .with_retryable(dto.retryable)
                .with_user_friendly(dto.user_friendly)
        }
    };
    boundary.translate(err, ctx.as_ref())
}

/// CORS layer with the platform's fixed policy: any origin, the five
/// standard methods, and the `Content-Type`/`Authorization` headers. Apply
/// only when CORS is enabled in configuration.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
