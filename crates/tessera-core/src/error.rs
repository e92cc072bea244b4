//! Error model for Tessera.
//!
//! This module provides [`GenericError`], the single error type that flows
//! through validation, middleware and the request pipeline. Errors form an
//! aggregation tree: any error may own a set of nested errors, deduplicated by
//! id.
//!
//! # Lifecycle
//!
//! An error is created where a fault is detected, enriched (data, hint,
//! nested errors) while it propagates, and serialized exactly once at the
//! response boundary via [`GenericError::serialize`].
//!
//! | `ErrorKind` | Default status |
//! |---|---|
//! | `Generic` | 500 |
//! | `MissingHandler` | 500 |
//! | `InvalidInput` | 400 |
//! | `MissingField` | 400 |
//! | `SchemaExecution` | 500 |
//! | `SchemaComposition` | 500 |
//! | `Middleware` | 500 |
//! | `MissingMiddlewareHandler` | 500 |
//! | `MiddlewareValidation` | 400 |
//! | `Pipeline` | 500 |
//! | `MethodNotAvailable` | 405 |
//! | `NoHandler` | 404 |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using [`GenericError`].
pub type TesseraResult<T> = Result<T, GenericError>;

/// Message used when an unknown value is canonicalized without a fallback.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Classification of every fault the framework can surface.
///
/// Serialized as the `type` field of the wire error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Canonical fallback for faults with no better classification.
    Generic,
    /// A validation leaf with no handler implementation.
    MissingHandler,
    /// A value failed a leaf check.
    InvalidInput,
    /// A required value was absent.
    MissingField,
    /// Internal fault while walking a schema.
    SchemaExecution,
    /// Schema fragments could not be merged.
    SchemaComposition,
    /// A middleware failed.
    Middleware,
    /// A middleware handles no pipeline stage.
    MissingMiddlewareHandler,
    /// A middleware rejected the request data.
    MiddlewareValidation,
    /// Fault in pipeline orchestration (wiring, double send).
    Pipeline,
    /// The route exists but not for the requested method.
    MethodNotAvailable,
    /// No route is registered under the requested key.
    NoHandler,
}

impl ErrorKind {
    /// Returns the default HTTP status code for this kind.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput | Self::MissingField | Self::MiddlewareValidation => {
                StatusCode::BAD_REQUEST
            }
            Self::MethodNotAvailable => StatusCode::METHOD_NOT_ALLOWED,
            Self::NoHandler => StatusCode::NOT_FOUND,
            Self::Generic
            | Self::MissingHandler
            | Self::SchemaExecution
            | Self::SchemaComposition
            | Self::Middleware
            | Self::MissingMiddlewareHandler
            | Self::Pipeline => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::MissingHandler => "missing_handler",
            Self::InvalidInput => "invalid_input",
            Self::MissingField => "missing_field",
            Self::SchemaExecution => "schema_execution",
            Self::SchemaComposition => "schema_composition",
            Self::Middleware => "middleware",
            Self::MissingMiddlewareHandler => "missing_middleware_handler",
            Self::MiddlewareValidation => "middleware_validation",
            Self::Pipeline => "pipeline",
            Self::MethodNotAvailable => "method_not_available",
            Self::NoHandler => "no_handler",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard error type for Tessera.
///
/// `GenericError` carries:
/// - an opaque unique id (UUID v7)
/// - a human-readable message and numeric code
/// - a [`ErrorKind`] type tag
/// - a free-form JSON data payload and an optional hint
/// - nested errors, deduplicated by id
///
/// # Example
///
/// ```
/// use tessera_core::{ErrorKind, GenericError};
///
/// let mut err = GenericError::invalid_input("Invalid number").with_hint("use digits");
/// let cause = GenericError::missing_field("user.age");
/// err.add_error(cause.clone());
/// err.add_error(cause);
///
/// assert_eq!(err.kind(), ErrorKind::InvalidInput);
/// assert_eq!(err.code(), 400);
/// assert_eq!(err.errors().len(), 1);
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct GenericError {
    id: Uuid,
    message: String,
    code: u16,
    kind: ErrorKind,
    data: Value,
    hint: Option<String>,
    errors: Vec<GenericError>,
}

impl GenericError {
    /// Creates an error of the given kind with that kind's default code.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            message: message.into(),
            code: kind.default_status_code().as_u16(),
            kind,
            data: Value::Null,
            hint: None,
            errors: Vec::new(),
        }
    }

    /// Creates a generic internal error (500).
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    /// Creates the error reported by a leaf that never overrode its handler.
    #[must_use]
    pub fn missing_handler() -> Self {
        Self::new(ErrorKind::MissingHandler, "Missing validation handler")
    }

    /// Creates an invalid-input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Creates a missing-field error for a dotted path.
    #[must_use]
    pub fn missing_field(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(ErrorKind::MissingField, format!("Missing field: {path}"))
            .with_data(serde_json::json!({ "path": path }))
    }

    /// Creates a schema-execution error.
    #[must_use]
    pub fn schema_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaExecution, message)
    }

    /// Creates a schema-composition error.
    #[must_use]
    pub fn composition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaComposition, message)
    }

    /// Creates a generic middleware error.
    #[must_use]
    pub fn middleware(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Middleware, message)
    }

    /// Creates the error for a middleware that handles no stage.
    #[must_use]
    pub fn missing_middleware_handler(middleware: impl Into<String>) -> Self {
        let middleware = middleware.into();
        Self::new(
            ErrorKind::MissingMiddlewareHandler,
            format!("Middleware '{middleware}' has no handler for any stage"),
        )
        .with_data(serde_json::json!({ "middleware": middleware }))
    }

    /// Creates a middleware validation error.
    #[must_use]
    pub fn middleware_validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MiddlewareValidation, message)
    }

    /// Creates a pipeline orchestration error.
    #[must_use]
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Pipeline, message)
    }

    /// Creates a 405 error for a method the route does not bind.
    #[must_use]
    pub fn method_not_available(method: impl fmt::Display) -> Self {
        let method = method.to_string();
        Self::new(
            ErrorKind::MethodNotAvailable,
            format!("Method {method} is not available on this route"),
        )
        .with_data(serde_json::json!({ "method": method }))
    }

    /// Creates a 404 error for an unknown route.
    #[must_use]
    pub fn no_handler(route: impl Into<String>) -> Self {
        let route = route.into();
        Self::new(ErrorKind::NoHandler, format!("No handler for route '{route}'"))
            .with_data(serde_json::json!({ "route": route }))
    }

    /// Canonicalizes any thrown value into a `GenericError`.
    ///
    /// - a `GenericError` (directly or inside an `anyhow::Error`) passes through
    /// - any other error is wrapped as a generic 500 carrying its message
    /// - a string becomes an invalid-input error
    /// - anything else becomes `fallback` (default: generic 500) with the value
    ///   attached as `data`
    ///
    /// `hint` is applied when the resulting error has none.
    #[must_use]
    pub fn from_unknown(
        thrown: impl Into<Thrown>,
        fallback: Option<GenericError>,
        hint: Option<&str>,
    ) -> Self {
        let error = match thrown.into() {
            Thrown::Error(error) => error,
            Thrown::Exception(exception) => match exception.downcast::<GenericError>() {
                Ok(error) => error,
                Err(exception) => Self::internal(exception.to_string()),
            },
            Thrown::Message(message) => Self::invalid_input(message),
            Thrown::Value(value) => {
                let fallback =
                    fallback.unwrap_or_else(|| Self::internal(UNKNOWN_ERROR_MESSAGE));
                if value.is_null() {
                    fallback
                } else {
                    fallback.with_data(value)
                }
            }
        };

        match hint {
            Some(hint) if error.hint.is_none() => error.with_hint(hint),
            _ => error,
        }
    }

    /// Returns the unique id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the numeric code.
    #[must_use]
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Returns the kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the data payload.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Returns the hint, if any.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Returns the nested errors in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[GenericError] {
        &self.errors
    }

    /// Returns the HTTP status for this error's code.
    ///
    /// Codes outside the valid HTTP range map to 500.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Overrides the numeric code.
    #[must_use]
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    /// Replaces the data payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Sets the hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attaches a nested error.
    ///
    /// No-op when `other` has this error's id or an id already present.
    /// Returns `true` if the error was attached.
    pub fn add_error(&mut self, other: GenericError) -> bool {
        if other.id == self.id || self.errors.iter().any(|e| e.id == other.id) {
            return false;
        }
        self.errors.push(other);
        true
    }

    /// Converts this error to its wire representation.
    #[must_use]
    pub fn serialize(&self) -> SerializedError {
        SerializedError {
            id: self.id,
            message: self.message.clone(),
            code: self.code,
            data: self.data.clone(),
            hint: self.hint.clone(),
            kind: self.kind,
            errors: self.errors.iter().map(Self::serialize).collect(),
        }
    }

    /// Rebuilds an error tree from its wire representation.
    #[must_use]
    pub fn deserialize(serialized: SerializedError) -> Self {
        let mut error = Self {
            id: serialized.id,
            message: serialized.message,
            code: serialized.code,
            kind: serialized.kind,
            data: serialized.data,
            hint: serialized.hint,
            errors: Vec::with_capacity(serialized.errors.len()),
        };
        for child in serialized.errors {
            error.add_error(Self::deserialize(child));
        }
        error
    }
}

/// Wire representation of a [`GenericError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedError {
    /// Unique error id.
    pub id: Uuid,
    /// Human-readable message.
    pub message: String,
    /// Numeric code.
    pub code: u16,
    /// Free-form payload.
    #[serde(default)]
    pub data: Value,
    /// Optional hint for the caller.
    #[serde(default)]
    pub hint: Option<String>,
    /// Error kind.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Nested errors.
    #[serde(default)]
    pub errors: Vec<SerializedError>,
}

impl From<GenericError> for SerializedError {
    fn from(error: GenericError) -> Self {
        error.serialize()
    }
}

impl From<SerializedError> for GenericError {
    fn from(serialized: SerializedError) -> Self {
        Self::deserialize(serialized)
    }
}

/// Any value a component may fail with, before canonicalization.
#[derive(Debug)]
pub enum Thrown {
    /// Already a typed error.
    Error(GenericError),
    /// A bare exception.
    Exception(anyhow::Error),
    /// A plain message.
    Message(String),
    /// Anything else.
    Value(Value),
}

impl Thrown {
    /// Converts a caught panic payload into a bare exception.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Exception(anyhow::anyhow!("panicked: {message}"))
    }
}

impl From<GenericError> for Thrown {
    fn from(error: GenericError) -> Self {
        Self::Error(error)
    }
}

impl From<anyhow::Error> for Thrown {
    fn from(error: anyhow::Error) -> Self {
        Self::Exception(error)
    }
}

impl From<String> for Thrown {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for Thrown {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<Value> for Thrown {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}
