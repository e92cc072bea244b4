//! Validation units.
//!
//! A [`Validator`] describes how one value is checked; a [`ValidationUnit`]
//! is a single-shot execution of a validator against one raw value.
//!
//! # Resolution contract
//!
//! The validator's handler receives a [`UnitHandle`] and resolves the unit by
//! calling [`UnitHandle::valid`] or [`UnitHandle::invalid`], either before
//! returning or later from a spawned continuation. Only the first resolution
//! takes effect; later attempts are recorded in the trace log and discarded.
//! Returning `Err` from the handler counts as an `invalid` call.
//!
//! ```
//! use serde_json::json;
//! use tessera_schema::{leaf, ValidationUnit};
//!
//! # tokio_test::block_on(async {
//! let mut unit = ValidationUnit::new(leaf::number(), json!("42"));
//! assert_eq!(unit.execute().await.unwrap(), json!(42));
//!
//! // A second execute performs no handler work and returns the same outcome.
//! assert_eq!(unit.execute().await.unwrap(), json!(42));
//! # });
//! ```

use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tessera_core::{debug_enabled, once_settle, GenericError, OnceSettle, Thrown};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a validation unit.
pub type UnitResult = Result<Value, GenericError>;

/// Future returned by a validator handler.
pub type HandlerFuture = BoxFuture<'static, Result<(), GenericError>>;

/// A validator shared between schema trees.
pub type SharedValidator = Arc<dyn Validator>;

/// Returns an already-completed handler future.
///
/// Synchronous leaves resolve their [`UnitHandle`] and return this.
#[must_use]
pub fn resolved() -> HandlerFuture {
    Box::pin(std::future::ready(Ok(())))
}

/// Type tag used when composing schema fragments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Textual value.
    String,
    /// Numeric value.
    Number,
    /// Boolean value.
    Boolean,
    /// UUID string.
    Uuid,
    /// Closed set of primitives.
    Enum,
    /// Homogeneous array.
    Array(Box<TypeTag>),
    /// User-supplied function.
    Custom,
    /// Nested mapping.
    Object,
    /// Validator without a declared tag.
    Unknown,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::Uuid => f.write_str("uuid"),
            Self::Enum => f.write_str("enum"),
            Self::Array(inner) => write!(f, "array<{inner}>"),
            Self::Custom => f.write_str("custom"),
            Self::Object => f.write_str("object"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// A self-describing validator for one value.
///
/// Every concrete leaf overrides [`Validator::handle`]; the default handler
/// always reports a missing-handler error.
pub trait Validator: Send + Sync + fmt::Debug + 'static {
    /// Returns the type tag used for fragment composition.
    fn tag(&self) -> TypeTag {
        TypeTag::Unknown
    }

    /// Returns `true` if this validator accepts absent values.
    fn is_optional(&self) -> bool {
        false
    }

    /// Returns the required form of an optional validator.
    fn required(&self) -> Option<SharedValidator> {
        None
    }

    /// Checks `raw` and resolves `unit`.
    fn handle(&self, raw: Value, unit: UnitHandle) -> HandlerFuture {
        let _ = raw;
        unit.invalid(GenericError::missing_handler());
        resolved()
    }
}

/// One entry of a unit's trace log.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEntry {
    /// The handler was invoked.
    Executed,
    /// The unit resolved valid.
    Valid,
    /// The unit resolved invalid.
    Invalid {
        /// Error message.
        message: String,
    },
    /// A resolution arrived after the unit was already resolved.
    Discarded {
        /// `"valid"` or `"invalid"`.
        attempt: &'static str,
    },
    /// `execute` was called again after the first run.
    ReExecuted,
}

#[derive(Debug, Default)]
struct TraceLog {
    entries: Mutex<Option<Vec<TraceEntry>>>,
}

impl TraceLog {
    fn push(&self, entry: TraceEntry) {
        if debug_enabled() {
            tracing::debug!(?entry, "validation unit trace");
        } else {
            tracing::trace!(?entry, "validation unit trace");
        }
        self.entries.lock().get_or_insert_with(Vec::new).push(entry);
    }

    fn snapshot(&self) -> Vec<TraceEntry> {
        self.entries.lock().clone().unwrap_or_default()
    }
}

/// Resolution handle passed to a validator's handler.
///
/// Cloneable and `'static`, so it may be moved into spawned tasks.
#[derive(Debug, Clone)]
pub struct UnitHandle {
    cell: OnceSettle<UnitResult>,
    trace: Arc<TraceLog>,
}

impl UnitHandle {
    /// Resolves the unit as valid. Returns `false` if it was already resolved.
    pub fn valid(&self, value: Value) -> bool {
        self.settle(Ok(value))
    }

    /// Resolves the unit as invalid. Returns `false` if it was already resolved.
    ///
    /// Strings become invalid-input errors.
    pub fn invalid(&self, error: impl Into<Thrown>) -> bool {
        self.settle(Err(GenericError::from_unknown(error, None, None)))
    }

    /// Resolves the unit with `result`.
    pub fn settle(&self, result: UnitResult) -> bool {
        let entry = match &result {
            Ok(_) => TraceEntry::Valid,
            Err(error) => TraceEntry::Invalid {
                message: error.message().to_string(),
            },
        };
        match self.cell.settle(result) {
            Ok(()) => {
                self.trace.push(entry);
                true
            }
            Err(late) => {
                let attempt = if late.is_ok() { "valid" } else { "invalid" };
                tracing::warn!(attempt, "validation unit already resolved, discarding");
                self.trace.push(TraceEntry::Discarded { attempt });
                false
            }
        }
    }

    /// Returns `true` once the unit has been resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.cell.is_settled()
    }
}

/// Single-shot execution of a validator against one raw value.
#[derive(Debug)]
pub struct ValidationUnit {
    validator: SharedValidator,
    raw: Option<Value>,
    trace: Arc<TraceLog>,
    outcome: Option<UnitResult>,
}

impl ValidationUnit {
    /// Wraps `raw` for validation by `validator`.
    #[must_use]
    pub fn new(validator: SharedValidator, raw: Value) -> Self {
        Self {
            validator,
            raw: Some(raw),
            trace: Arc::new(TraceLog::default()),
            outcome: None,
        }
    }

    /// Runs the handler and waits for its resolution.
    ///
    /// Only the first call invokes the handler. Later calls log a warning and
    /// return the recorded outcome.
    pub async fn execute(&mut self) -> UnitResult {
        let Some(raw) = self.raw.take() else {
            self.trace.push(TraceEntry::ReExecuted);
            tracing::warn!(tag = %self.validator.tag(), "validation unit executed more than once");
            return self.outcome.clone().unwrap_or_else(|| {
                Err(GenericError::schema_execution(
                    "validation unit was interrupted before resolving",
                ))
            });
        };

        let (cell, settlement) = once_settle();
        let handle = UnitHandle {
            cell,
            trace: Arc::clone(&self.trace),
        };

        self.trace.push(TraceEntry::Executed);
        if let Err(error) = self.validator.handle(raw, handle.clone()).await {
            handle.invalid(error);
        }
        drop(handle);

        let outcome = settlement.wait().await.unwrap_or_else(|| {
            Err(GenericError::schema_execution(
                "validation handler finished without resolving",
            ))
        });
        self.outcome = Some(outcome.clone());
        outcome
    }

    /// Returns `true` once the unit has an outcome.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    /// Returns the ordered trace log.
    #[must_use]
    pub fn trace(&self) -> Vec<TraceEntry> {
        self.trace.snapshot()
    }
}

/// Validates `raw` with a fresh unit.
pub async fn run(validator: &SharedValidator, raw: Value) -> UnitResult {
    ValidationUnit::new(Arc::clone(validator), raw).execute().await
}
