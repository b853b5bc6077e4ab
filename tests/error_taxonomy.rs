// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cross-cutting invariants of the error taxonomy: every code classifies
//! into exactly one category, inherits that category's defaults, and maps to
//! a sane HTTP status and wire name.

use faultline::error::{
    ALL_CODES, AppError, ErrorCategory, ErrorCode, ErrorSeverity, GENERIC_USER_MESSAGE,
};

#[test]
fn every_code_inherits_its_category_defaults() {
    for &code in ALL_CODES {
        let err = AppError::new(code, "probe");
        let defaults = code.category().defaults();
        assert_eq!(err.severity(), defaults.severity, "{code:?}");
        assert_eq!(err.is_retryable(), defaults.retryable, "{code:?}");
        assert_eq!(err.is_user_friendly(), defaults.user_friendly, "{code:?}");
    }
}

#[test]
fn wire_names_are_screaming_snake_case_and_stable() {
    for &code in ALL_CODES {
        let name = code.as_str();
        assert!(
            name.chars().all(|c| c.is_ascii_uppercase() || c == '_'),
            "{name}"
        );
        // serde and as_str must agree on the wire form.
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, format!("\"{name}\""));
        // And the name must parse back to the same code.
        assert_eq!(name.parse::<ErrorCode>().unwrap(), code);
    }
}

#[test]
fn http_statuses_are_valid_and_follow_category_shape() {
    for &code in ALL_CODES {
        let status = code.http_status();
        assert!((400..=599).contains(&status), "{code:?} -> {status}");
    }
    // Spot checks on the boundary-visible mappings.
    assert_eq!(ErrorCode::AuthInvalidCredentials.http_status(), 401);
    assert_eq!(ErrorCode::AuthTokenExpired.http_status(), 401);
    assert_eq!(ErrorCode::AuthzAccessDenied.http_status(), 403);
    assert_eq!(ErrorCode::ValidationError.http_status(), 400);
    assert_eq!(ErrorCode::ResourceNotFound.http_status(), 404);
    assert_eq!(ErrorCode::DatabaseConnectionFailed.http_status(), 503);
    assert_eq!(ErrorCode::NetworkTimeout.http_status(), 504);
    assert_eq!(ErrorCode::UnknownError.http_status(), 500);
}

#[test]
fn user_messages_never_leak_raw_detail_for_unfriendly_codes() {
    let err = AppError::new(ErrorCode::DatabaseQueryFailed, "relation \"users\" missing");
    assert!(!err.is_user_friendly());
    assert!(!err.user_message().contains("relation"));

    let friendly = AppError::new(ErrorCode::ValidationError, "email must not be empty");
    assert!(friendly.is_user_friendly());
    assert_eq!(friendly.user_message(), "email must not be empty");
}

#[test]
fn normalized_foreign_errors_fall_back_to_generic_message() {
    let err = AppError::normalize(anyhow::anyhow!("ECONNREFUSED 10.0.0.3:5432"));
    assert_eq!(err.code(), ErrorCode::UnknownError);
    assert_eq!(err.category(), ErrorCategory::Unknown);
    assert_eq!(err.user_message(), GENERIC_USER_MESSAGE);
    // The raw detail stays available for logs.
    assert!(err.message.contains("ECONNREFUSED"));
}

#[test]
fn severity_ordering_supports_threshold_gates() {
    assert!(ErrorSeverity::Low < ErrorSeverity::Medium);
    assert!(ErrorSeverity::Medium < ErrorSeverity::High);
    assert!(ErrorSeverity::High < ErrorSeverity::Critical);
}
