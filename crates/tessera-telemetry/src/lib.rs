//! # Tessera Telemetry
//!
//! Structured logging for the Tessera request-binding framework.
//!
//! - [`init_logging`] - Installs a JSON or pretty `tracing-subscriber` stack
//! - [`LogConfig`] - Filter directive, format and output options
//! - [`fields`] - Standard structured field names

#![doc(html_root_url = "https://docs.rs/tessera-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
