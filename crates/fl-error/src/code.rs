// SPDX-License-Identifier: MIT OR Apache-2.0
//! Closed sets of error codes, categories, and severities.
//!
//! Every table the platform keys on an error code — HTTP status, user-facing
//! hint, category membership — lives here as an exhaustive `match`, so adding
//! a code without deciding its policy is a compile error rather than a silent
//! 500 at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad failure class that drives default handling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Input failed structural or semantic validation.
    Validation,
    /// The caller could not be identified.
    Authentication,
    /// The caller is identified but not allowed.
    Authorization,
    /// A storage-layer operation failed.
    Database,
    /// A transport or remote-service failure.
    Network,
    /// A domain rule rejected the operation.
    Business,
    /// Platform-level failure (maintenance, overload, internal bugs).
    System,
    /// The failure could not be classified.
    Unknown,
}

/// All categories, for exhaustive iteration in tests and hooks.
pub const ALL_CATEGORIES: &[ErrorCategory] = &[
    ErrorCategory::Validation,
    ErrorCategory::Authentication,
    ErrorCategory::Authorization,
    ErrorCategory::Database,
    ErrorCategory::Network,
    ErrorCategory::Business,
    ErrorCategory::System,
    ErrorCategory::Unknown,
];

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Database => "database",
            Self::Network => "network",
            Self::Business => "business",
            Self::System => "system",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorSeverity
// ---------------------------------------------------------------------------

/// Escalation level of a failure. Ordered: `Low < Medium < High < Critical`,
/// so severity gates can be written as `severity >= ErrorSeverity::High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Routine, expected failures (bad input).
    Low,
    /// Degraded but recoverable.
    Medium,
    /// Needs attention; user-blocking.
    High,
    /// Platform integrity at risk.
    Critical,
}

/// All severities, for exhaustive iteration in tests.
pub const ALL_SEVERITIES: &[ErrorSeverity] = &[
    ErrorSeverity::Low,
    ErrorSeverity::Medium,
    ErrorSeverity::High,
    ErrorSeverity::Critical,
];

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Category defaults
// ---------------------------------------------------------------------------

/// Per-category default policy applied at construction unless overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDefaults {
    /// Default escalation level.
    pub severity: ErrorSeverity,
    /// Whether repeating the operation unchanged may succeed.
    pub retryable: bool,
    /// Whether the raw message is safe to show to an end user.
    pub user_friendly: bool,
}

impl ErrorCategory {
    /// The fixed default table for this category.
    pub fn defaults(&self) -> CategoryDefaults {
        match self {
            Self::Validation => CategoryDefaults {
                severity: ErrorSeverity::Low,
                retryable: false,
                user_friendly: true,
            },
            Self::Authentication => CategoryDefaults {
                severity: ErrorSeverity::High,
                retryable: false,
                user_friendly: true,
            },
            Self::Authorization => CategoryDefaults {
                severity: ErrorSeverity::High,
                retryable: false,
                user_friendly: true,
            },
            Self::Database => CategoryDefaults {
                severity: ErrorSeverity::High,
                retryable: true,
                user_friendly: false,
            },
            Self::Network => CategoryDefaults {
                severity: ErrorSeverity::Medium,
                retryable: true,
                user_friendly: true,
            },
            Self::Business => CategoryDefaults {
                severity: ErrorSeverity::Medium,
                retryable: false,
                user_friendly: true,
            },
            Self::System => CategoryDefaults {
                severity: ErrorSeverity::Critical,
                retryable: true,
                user_friendly: false,
            },
            Self::Unknown => CategoryDefaults {
                severity: ErrorSeverity::Medium,
                retryable: false,
                user_friendly: true,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across releases; client retry logic and the
/// ignore-list key on these strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Authentication --
    /// Supplied credentials did not match any account.
    AuthInvalidCredentials,
    /// The session has expired and must be renewed.
    AuthSessionExpired,
    /// The presented token is malformed or unrecognised.
    AuthTokenInvalid,
    /// The presented token is past its expiry.
    AuthTokenExpired,

    // -- Authorization --
    /// The caller lacks a required permission.
    AuthzInsufficientPermissions,
    /// Access to the resource is denied.
    AuthzAccessDenied,
    /// A specific role is required for the operation.
    AuthzRoleRequired,

    // -- Validation --
    /// Generic validation failure.
    ValidationError,
    /// A required field was missing.
    ValidationRequiredField,
    /// A field value had the wrong format.
    ValidationInvalidFormat,
    /// A field value was outside its allowed range.
    ValidationOutOfRange,

    // -- Not found --
    /// The addressed resource does not exist.
    ResourceNotFound,
    /// A database lookup matched no record.
    DatabaseRecordNotFound,
    /// No account matches the given identifier.
    UserNotFound,

    // -- Database --
    /// A uniqueness constraint was violated.
    DatabaseDuplicateEntry,
    /// The database connection could not be established.
    DatabaseConnectionFailed,
    /// A query failed for a reason other than the above.
    DatabaseQueryFailed,

    // -- Business --
    /// The operation conflicts with current domain state.
    BusinessConflict,
    /// A domain rule rejected the operation.
    BusinessRuleViolation,

    // -- Network --
    /// A remote call exceeded its deadline.
    NetworkTimeout,
    /// The upstream service returned a server error.
    NetworkServerError,
    /// The client appears to be offline.
    NetworkOffline,

    // -- Cancellation --
    /// The operation was cancelled by its owner.
    OperationCancelled,

    // -- System --
    /// The platform is in scheduled maintenance.
    SystemMaintenance,
    /// The platform is shedding load.
    SystemOverload,
    /// Unexpected internal platform failure.
    SystemError,
    /// A foreign error escaped a request handler unclassified.
    ApiError,

    // -- Unknown --
    /// A thrown value that could not be normalised to anything better.
    UnknownError,
}

/// All error codes, for exhaustive iteration in tests.
pub const ALL_CODES: &[ErrorCode] = &[
    ErrorCode::AuthInvalidCredentials,
    ErrorCode::AuthSessionExpired,
    ErrorCode::AuthTokenInvalid,
    ErrorCode::AuthTokenExpired,
    ErrorCode::AuthzInsufficientPermissions,
    ErrorCode::AuthzAccessDenied,
    ErrorCode::AuthzRoleRequired,
    ErrorCode::ValidationError,
    ErrorCode::ValidationRequiredField,
    ErrorCode::ValidationInvalidFormat,
    ErrorCode::ValidationOutOfRange,
    ErrorCode::ResourceNotFound,
    ErrorCode::DatabaseRecordNotFound,
    ErrorCode::UserNotFound,
    ErrorCode::DatabaseDuplicateEntry,
    ErrorCode::DatabaseConnectionFailed,
    ErrorCode::DatabaseQueryFailed,
    ErrorCode::BusinessConflict,
    ErrorCode::BusinessRuleViolation,
    ErrorCode::NetworkTimeout,
    ErrorCode::NetworkServerError,
    ErrorCode::NetworkOffline,
    ErrorCode::OperationCancelled,
    ErrorCode::SystemMaintenance,
    ErrorCode::SystemOverload,
    ErrorCode::SystemError,
    ErrorCode::ApiError,
    ErrorCode::UnknownError,
];

impl ErrorCode {
    /// Returns the [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthInvalidCredentials
            | Self::AuthSessionExpired
            | Self::AuthTokenInvalid
            | Self::AuthTokenExpired => ErrorCategory::Authentication,

            Self::AuthzInsufficientPermissions
            | Self::AuthzAccessDenied
            | Self::AuthzRoleRequired => ErrorCategory::Authorization,

            Self::ValidationError
            | Self::ValidationRequiredField
            | Self::ValidationInvalidFormat
            | Self::ValidationOutOfRange => ErrorCategory::Validation,

            Self::ResourceNotFound | Self::UserNotFound => ErrorCategory::Business,

            Self::DatabaseRecordNotFound
            | Self::DatabaseDuplicateEntry
            | Self::DatabaseConnectionFailed
            | Self::DatabaseQueryFailed => ErrorCategory::Database,

            Self::BusinessConflict | Self::BusinessRuleViolation => ErrorCategory::Business,

            Self::NetworkTimeout | Self::NetworkServerError | Self::NetworkOffline => {
                ErrorCategory::Network
            }

            Self::OperationCancelled => ErrorCategory::Business,

            Self::SystemMaintenance | Self::SystemOverload | Self::SystemError | Self::ApiError => {
                ErrorCategory::System
            }

            Self::UnknownError => ErrorCategory::Unknown,
        }
    }

    /// Stable string form of the code (e.g. `"AUTH_INVALID_CREDENTIALS"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthInvalidCredentials => "AUTH_INVALID_CREDENTIALS",
            Self::AuthSessionExpired => "AUTH_SESSION_EXPIRED",
            Self::AuthTokenInvalid => "AUTH_TOKEN_INVALID",
            Self::AuthTokenExpired => "AUTH_TOKEN_EXPIRED",
            Self::AuthzInsufficientPermissions => "AUTHZ_INSUFFICIENT_PERMISSIONS",
            Self::AuthzAccessDenied => "AUTHZ_ACCESS_DENIED",
            Self::AuthzRoleRequired => "AUTHZ_ROLE_REQUIRED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ValidationRequiredField => "VALIDATION_REQUIRED_FIELD",
            Self::ValidationInvalidFormat => "VALIDATION_INVALID_FORMAT",
            Self::ValidationOutOfRange => "VALIDATION_OUT_OF_RANGE",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::DatabaseRecordNotFound => "DATABASE_RECORD_NOT_FOUND",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::DatabaseDuplicateEntry => "DATABASE_DUPLICATE_ENTRY",
            Self::DatabaseConnectionFailed => "DATABASE_CONNECTION_FAILED",
            Self::DatabaseQueryFailed => "DATABASE_QUERY_FAILED",
            Self::BusinessConflict => "BUSINESS_CONFLICT",
            Self::BusinessRuleViolation => "BUSINESS_RULE_VIOLATION",
            Self::NetworkTimeout => "NETWORK_TIMEOUT",
            Self::NetworkServerError => "NETWORK_SERVER_ERROR",
            Self::NetworkOffline => "NETWORK_OFFLINE",
            Self::OperationCancelled => "OPERATION_CANCELLED",
            Self::SystemMaintenance => "SYSTEM_MAINTENANCE",
            Self::SystemOverload => "SYSTEM_OVERLOAD",
            Self::SystemError => "SYSTEM_ERROR",
            Self::ApiError => "API_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// HTTP status the wire boundary responds with for this code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthInvalidCredentials
            | Self::AuthSessionExpired
            | Self::AuthTokenInvalid
            | Self::AuthTokenExpired => 401,

            Self::AuthzInsufficientPermissions
            | Self::AuthzAccessDenied
            | Self::AuthzRoleRequired => 403,

            Self::ValidationError
            | Self::ValidationRequiredField
            | Self::ValidationInvalidFormat
            | Self::ValidationOutOfRange => 400,

            Self::ResourceNotFound | Self::DatabaseRecordNotFound | Self::UserNotFound => 404,

            Self::DatabaseDuplicateEntry | Self::BusinessConflict => 409,

            Self::DatabaseConnectionFailed | Self::SystemMaintenance | Self::SystemOverload => 503,

            Self::NetworkTimeout => 504,
            Self::NetworkServerError => 502,

            Self::DatabaseQueryFailed
            | Self::BusinessRuleViolation
            | Self::NetworkOffline
            | Self::OperationCancelled
            | Self::SystemError
            | Self::ApiError
            | Self::UnknownError => 500,
        }
    }

    /// Fixed user-facing hint for codes whose raw message is not safe to
    /// surface. `None` means the caller falls back to [`GENERIC_USER_MESSAGE`].
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::AuthInvalidCredentials => Some("The email or password you entered is incorrect."),
            Self::AuthSessionExpired => Some("Your session has expired. Please sign in again."),
            Self::AuthTokenInvalid | Self::AuthTokenExpired => {
                Some("Your sign-in is no longer valid. Please sign in again.")
            }
            Self::AuthzInsufficientPermissions
            | Self::AuthzAccessDenied
            | Self::AuthzRoleRequired => Some("You don't have permission to do that."),
            Self::ValidationError
            | Self::ValidationRequiredField
            | Self::ValidationInvalidFormat
            | Self::ValidationOutOfRange => Some("Please check the highlighted fields and retry."),
            Self::ResourceNotFound | Self::DatabaseRecordNotFound | Self::UserNotFound => {
                Some("We couldn't find what you were looking for.")
            }
            Self::DatabaseDuplicateEntry => Some("That already exists."),
            Self::BusinessConflict => Some("That change conflicts with the current state."),
            Self::NetworkTimeout => Some("The request timed out. Please try again."),
            Self::NetworkOffline => Some("You appear to be offline. Check your connection."),
            Self::SystemMaintenance => {
                Some("We're down for scheduled maintenance. Back shortly.")
            }
            Self::SystemOverload => Some("We're experiencing heavy load. Please try again soon."),
            Self::DatabaseConnectionFailed
            | Self::DatabaseQueryFailed
            | Self::BusinessRuleViolation
            | Self::NetworkServerError
            | Self::OperationCancelled
            | Self::SystemError
            | Self::ApiError
            | Self::UnknownError => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorCode {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_CODES
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownCode(s.to_owned()))
    }
}

/// Returned when a string does not name any known [`ErrorCode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCode(pub String);

impl fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error code: {}", self.0)
    }
}

impl std::error::Error for UnknownCode {}

/// Fallback shown when no safer message exists. Never reveals internals.
pub const GENERIC_USER_MESSAGE: &str = "An unexpected error occurred. Please try again.";
