// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for Faultline.
//!
//! This crate provides [`ResilienceConfig`] — the framework's runtime
//! settings — together with helpers for loading from TOML files, applying
//! environment overrides, merging overlays, and producing advisory
//! [`ConfigWarning`]s. The config is built once at process start and handed
//! to the handler/middleware by value; nothing here is globally mutable.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use fl_error::ErrorCode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A retry setting is unusually aggressive.
    AggressiveRetry {
        /// Which field.
        field: String,
        /// The configured value.
        value: u64,
    },
    /// Notification rate limits are configured but not enforced.
    InertRateLimit,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::AggressiveRetry { field, value } => {
                write!(f, "'{field}' = {value} is unusually aggressive")
            }
            ConfigWarning::InertRateLimit => {
                write!(
                    f,
                    "notification rate limits are configured but dispatch is unthrottled"
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Deployment environment; controls whether wire responses expose internals.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Local development: internals exposed, console sink verbose.
    Development,
    /// Pre-production.
    Staging,
    /// Production: internals never exposed.
    #[default]
    Production,
}

impl Environment {
    /// Whether wire responses may include stack/category/severity details.
    pub fn expose_internals(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Which error sinks are active. Selection logic (credential presence,
/// deployment flags) lives with the caller; the logger only consumes these
/// booleans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SinkFlags {
    /// Baseline tracing/console sink.
    #[serde(default = "default_true")]
    pub console: bool,
    /// Persistent JSON-line sink.
    #[serde(default)]
    pub persistent: bool,
    /// External telemetry sink.
    #[serde(default)]
    pub telemetry: bool,
}

impl Default for SinkFlags {
    fn default() -> Self {
        Self {
            console: true,
            persistent: false,
            telemetry: false,
        }
    }
}

/// Notification rate-limit settings.
///
/// Present for forward compatibility: notifier dispatch is currently
/// unthrottled and these values are not enforced anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationLimits {
    /// Maximum notifications per minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_minute: Option<u32>,
    /// Maximum notifications per hour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_hour: Option<u32>,
    /// Maximum notifications per day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_day: Option<u32>,
    /// Cooldown between repeated notifications, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_secs: Option<u64>,
}

impl NotificationLimits {
    fn is_configured(&self) -> bool {
        self.max_per_minute.is_some()
            || self.max_per_hour.is_some()
            || self.max_per_day.is_some()
            || self.cooldown_secs.is_some()
    }
}

/// Top-level runtime configuration for the Faultline framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResilienceConfig {
    /// Whether handled errors are logged at all.
    #[serde(default = "default_true")]
    pub log_errors: bool,

    /// Whether high/critical errors trigger notifier dispatch.
    #[serde(default = "default_true")]
    pub notify_errors: bool,

    /// Whether ambient request context is captured onto errors.
    #[serde(default = "default_true")]
    pub capture_context: bool,

    /// Default maximum retry count for retry wrappers.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Default base backoff delay in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Stable error codes the handler ignores entirely (no logging, hooks,
    /// or notification). Validated against the known code set.
    #[serde(default)]
    pub ignored_codes: Vec<String>,

    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,

    /// Whether the wire boundary emits CORS headers.
    #[serde(default)]
    pub cors_enabled: bool,

    /// Active error sinks.
    #[serde(default)]
    pub sinks: SinkFlags,

    /// Notification rate limits (currently inert; see crate docs).
    #[serde(default)]
    pub notifications: NotificationLimits,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            log_errors: true,
            notify_errors: true,
            capture_context: true,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            ignored_codes: Vec::new(),
            environment: Environment::default(),
            cors_enabled: false,
            sinks: SinkFlags::default(),
            notifications: NotificationLimits::default(),
        }
    }
}

impl ResilienceConfig {
    /// Parsed form of [`ignored_codes`](Self::ignored_codes). Call after
    /// [`validate_config`] so unknown strings have already been rejected.
    pub fn parsed_ignored_codes(&self) -> Vec<ErrorCode> {
        self.ignored_codes
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect()
    }
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Retry counts above this generate a warning.
const AGGRESSIVE_RETRY_THRESHOLD: u32 = 10;

/// Base delays below this (in ms) generate a warning.
const MIN_SANE_RETRY_DELAY_MS: u64 = 10;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`ResilienceConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ResilienceConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<ResilienceConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => ResilienceConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`ResilienceConfig`].
pub fn parse_toml(content: &str) -> Result<ResilienceConfig, ConfigError> {
    toml::from_str::<ResilienceConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `FL_ENVIRONMENT` (`development` / `staging` / `production`)
/// - `FL_MAX_RETRIES`
/// - `FL_RETRY_DELAY_MS`
/// - `FL_CORS_ENABLED` (`true` / `false`)
pub fn apply_env_overrides(config: &mut ResilienceConfig) {
    if let Ok(val) = std::env::var("FL_ENVIRONMENT") {
        match val.as_str() {
            "development" => config.environment = Environment::Development,
            "staging" => config.environment = Environment::Staging,
            "production" => config.environment = Environment::Production,
            _ => {}
        }
    }
    if let Ok(val) = std::env::var("FL_MAX_RETRIES")
        && let Ok(n) = val.parse()
    {
        config.max_retries = n;
    }
    if let Ok(val) = std::env::var("FL_RETRY_DELAY_MS")
        && let Ok(n) = val.parse()
    {
        config.retry_delay_ms = n;
    }
    if let Ok(val) = std::env::var("FL_CORS_ENABLED")
        && let Ok(b) = val.parse()
    {
        config.cors_enabled = b;
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (unknown ignored codes, zero retry delay) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &ResilienceConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    for code in &config.ignored_codes {
        if code.parse::<ErrorCode>().is_err() {
            errors.push(format!("ignored_codes contains unknown code '{code}'"));
        }
    }

    if config.retry_delay_ms == 0 {
        errors.push("retry_delay_ms must be at least 1".into());
    } else if config.retry_delay_ms < MIN_SANE_RETRY_DELAY_MS {
        warnings.push(ConfigWarning::AggressiveRetry {
            field: "retry_delay_ms".into(),
            value: config.retry_delay_ms,
        });
    }

    if config.max_retries > AGGRESSIVE_RETRY_THRESHOLD {
        warnings.push(ConfigWarning::AggressiveRetry {
            field: "max_retries".into(),
            value: config.max_retries as u64,
        });
    }

    if !config.sinks.console && !config.sinks.persistent && !config.sinks.telemetry {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "sinks".into(),
            hint: "no sinks active; errors will only reach the fallback".into(),
        });
    }

    if config.notifications.is_configured() {
        warnings.push(ConfigWarning::InertRateLimit);
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`
/// wherever the overlay differs from the defaults; ignored-code lists are
/// unioned.
pub fn merge_configs(base: ResilienceConfig, overlay: ResilienceConfig) -> ResilienceConfig {
    let defaults = ResilienceConfig::default();
    let mut ignored = base.ignored_codes;
    for code in overlay.ignored_codes {
        if !ignored.contains(&code) {
            ignored.push(code);
        }
    }
    ResilienceConfig {
        log_errors: pick(base.log_errors, overlay.log_errors, defaults.log_errors),
        notify_errors: pick(
            base.notify_errors,
            overlay.notify_errors,
            defaults.notify_errors,
        ),
        capture_context: pick(
            base.capture_context,
            overlay.capture_context,
            defaults.capture_context,
        ),
        max_retries: pick(base.max_retries, overlay.max_retries, defaults.max_retries),
        retry_delay_ms: pick(
            base.retry_delay_ms,
            overlay.retry_delay_ms,
            defaults.retry_delay_ms,
        ),
        ignored_codes: ignored,
        environment: pick(base.environment, overlay.environment, defaults.environment),
        cors_enabled: pick(
            base.cors_enabled,
            overlay.cors_enabled,
            defaults.cors_enabled,
        ),
        sinks: pick(base.sinks, overlay.sinks, defaults.sinks),
        notifications: pick(
            base.notifications,
            overlay.notifications,
            defaults.notifications,
        ),
    }
}

fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay == default { base } else { overlay }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let cfg = ResilienceConfig::default();
        let warnings = validate_config(&cfg).expect("default config should be valid");
        assert!(warnings.is_empty());
    }

    #[test]
    fn default_config_has_sensible_defaults() {
        let cfg = ResilienceConfig::default();
        assert!(cfg.log_errors);
        assert!(cfg.notify_errors);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retry_delay_ms, 1_000);
        assert_eq!(cfg.environment, Environment::Production);
        assert!(cfg.sinks.console);
        assert!(!cfg.sinks.persistent);
    }

    #[test]
    fn parse_valid_toml_string() {
        let toml = r#"
            max_retries = 5
            retry_delay_ms = 250
            environment = "development"
            cors_enabled = true
            ignored_codes = ["OPERATION_CANCELLED", "NETWORK_OFFLINE"]

            [sinks]
            console = true
            persistent = true
        "#;
        let cfg = parse_toml(toml).unwrap();
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.retry_delay_ms, 250);
        assert_eq!(cfg.environment, Environment::Development);
        assert!(cfg.cors_enabled);
        assert!(cfg.sinks.persistent);
        assert_eq!(
            cfg.parsed_ignored_codes(),
            vec![ErrorCode::OperationCancelled, ErrorCode::NetworkOffline]
        );
    }

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let err = parse_toml("this is [not valid toml =").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn parse_wrong_types_gives_parse_error() {
        let err = parse_toml(r#"max_retries = "lots""#).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn validation_catches_unknown_ignored_code() {
        let cfg = ResilienceConfig {
            ignored_codes: vec!["NOT_A_REAL_CODE".into()],
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn validation_catches_zero_retry_delay() {
        let cfg = ResilienceConfig {
            retry_delay_ms: 0,
            ..Default::default()
        };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn validation_warns_on_aggressive_retries() {
        let cfg = ResilienceConfig {
            max_retries: 50,
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::AggressiveRetry { .. })));
    }

    #[test]
    fn validation_warns_on_inert_rate_limits() {
        let cfg = ResilienceConfig {
            notifications: NotificationLimits {
                max_per_minute: Some(10),
                ..Default::default()
            },
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings.contains(&ConfigWarning::InertRateLimit));
    }

    #[test]
    fn validation_warns_when_no_sinks_active() {
        let cfg = ResilienceConfig {
            sinks: SinkFlags {
                console: false,
                persistent: false,
                telemetry: false,
            },
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::MissingOptionalField { .. })));
    }

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/faultline.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_from_file_round_trips() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_retries = 7").unwrap();
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.max_retries, 7);
    }

    #[test]
    fn merge_overlay_wins_where_it_differs() {
        let base = ResilienceConfig {
            max_retries: 5,
            environment: Environment::Staging,
            ..Default::default()
        };
        let overlay = ResilienceConfig {
            retry_delay_ms: 100,
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.max_retries, 5); // base kept (overlay was default)
        assert_eq!(merged.retry_delay_ms, 100); // overlay wins
        assert_eq!(merged.environment, Environment::Staging);
    }

    #[test]
    fn merge_unions_ignored_codes() {
        let base = ResilienceConfig {
            ignored_codes: vec!["OPERATION_CANCELLED".into()],
            ..Default::default()
        };
        let overlay = ResilienceConfig {
            ignored_codes: vec!["NETWORK_OFFLINE".into(), "OPERATION_CANCELLED".into()],
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.ignored_codes.len(), 2);
    }

    #[test]
    fn environment_gates_internals() {
        assert!(Environment::Development.expose_internals());
        assert!(!Environment::Staging.expose_internals());
        assert!(!Environment::Production.expose_internals());
    }
}
