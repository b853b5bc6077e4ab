// SPDX-License-Identifier: MIT OR Apache-2.0
//! Faultline: error classification and resilience for the PrepWell platform.
//!
//! This facade re-exports the workspace crates so applications can depend on
//! a single `faultline` entry point:
//!
//! - [`error`] — the closed error taxonomy, [`AppError`], and contexts
//! - [`logger`] — pluggable multi-sink error logging
//! - [`config`] — immutable-at-startup resilience configuration
//! - [`handler`] — the central handler: normalize, log, hooks, notify, retry
//! - [`middleware`] — the axum wire boundary and response envelope
//! - [`opstate`] — the client-side operation state machine
//!
//! Typical wiring at process start:
//!
//! ```no_run
//! use std::sync::Arc;
//! use faultline::config::load_config;
//! use faultline::handler::{ErrorHandler, HandlerConfig};
//! use faultline::logger::{ConsoleSink, ErrorLogger};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = load_config(None)?;
//! let logger = Arc::new(ErrorLogger::with_sinks(
//!     Arc::new(ConsoleSink),
//!     vec![Arc::new(ConsoleSink)],
//! ));
//! let handler = Arc::new(ErrorHandler::new(logger, HandlerConfig::from(&config)));
//! # let _ = handler;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use fl_config as config;
pub use fl_error as error;
pub use fl_handler as handler;
pub use fl_logger as logger;
pub use fl_middleware as middleware;
pub use fl_opstate as opstate;

pub use fl_error::{AppError, ErrorCategory, ErrorCode, ErrorContext, ErrorSeverity};
pub use fl_handler::{ErrorHandler, HandlerConfig, RetryPolicy};
