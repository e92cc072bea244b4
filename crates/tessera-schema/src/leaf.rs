//! Standard validation leaves.
//!
//! Leaves are built with the factory functions in this module and composed
//! the same way: [`optional`] and [`array`] take another leaf and return a new
//! one.
//!
//! | Factory | Accepts |
//! |---|---|
//! | [`string`] | strings, numbers and booleans (coerced to text) |
//! | [`number`], [`integer`], [`float`] | JSON numbers and numeric strings within ±(2^53−1) |
//! | [`boolean`] | JSON booleans and `"true"`/`"false"` in any case |
//! | [`uuid`], [`uuid_with`] | UUID strings, optionally of one version |
//! | [`one_of`] | members of a closed set of primitives |
//! | [`optional`], [`optional_or`] | absence, `null` or `""`, otherwise the inner leaf |
//! | [`array`] | arrays whose every element passes the inner leaf |
//! | [`custom`], [`custom_async`] | whatever the supplied function accepts |
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tessera_schema::{leaf, unit};
//!
//! # tokio_test::block_on(async {
//! let flags = leaf::array(leaf::boolean());
//! let result = unit::run(&flags, json!([true, "FALSE"])).await;
//! assert_eq!(result.unwrap(), json!([true, false]));
//!
//! let error = unit::run(&flags, json!([true, "nope"])).await.unwrap_err();
//! assert_eq!(error.message(), "Invalid boolean");
//! # });
//! ```

use crate::unit::{
    resolved, BoxFuture, HandlerFuture, SharedValidator, TypeTag, UnitHandle, ValidationUnit,
    Validator,
};
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tessera_core::GenericError;
use uuid::Uuid;

/// Largest integer exactly representable in an IEEE-754 double.
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Accepts any value with a usable text form.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringValidator;

impl Validator for StringValidator {
    fn tag(&self) -> TypeTag {
        TypeTag::String
    }

    fn handle(&self, raw: Value, unit: UnitHandle) -> HandlerFuture {
        match raw {
            Value::String(text) => unit.valid(Value::String(text)),
            Value::Number(number) => unit.valid(Value::String(number.to_string())),
            Value::Bool(flag) => unit.valid(Value::String(flag.to_string())),
            _ => unit.invalid(GenericError::invalid_input("Invalid string")),
        };
        resolved()
    }
}

/// Which numbers a [`NumberValidator`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberMode {
    /// Integral values only; yields an integer.
    Integer,
    /// Any finite value; always yields a float.
    Float,
    /// Any finite value; yields an integer when integral.
    #[default]
    Any,
}

/// Accepts numbers and numeric strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberValidator {
    mode: NumberMode,
}

impl NumberValidator {
    /// Creates a number validator with the given mode.
    #[must_use]
    pub const fn new(mode: NumberMode) -> Self {
        Self { mode }
    }

    fn parse(&self, raw: &Value) -> Result<Value, GenericError> {
        let invalid = || {
            GenericError::invalid_input("Invalid number").with_data(json!({ "value": raw }))
        };

        let number = match raw {
            Value::Number(number) => number.as_f64().ok_or_else(invalid)?,
            Value::String(text) => {
                let text = text.trim();
                if text.is_empty()
                    || text.eq_ignore_ascii_case("true")
                    || text.eq_ignore_ascii_case("false")
                {
                    return Err(invalid());
                }
                text.parse::<f64>().map_err(|_| invalid())?
            }
            _ => return Err(invalid()),
        };

        if !number.is_finite() || number.abs() > MAX_SAFE_INTEGER as f64 {
            return Err(invalid());
        }

        let integral = number.fract() == 0.0;
        match self.mode {
            NumberMode::Integer if !integral => Err(invalid()),
            NumberMode::Integer | NumberMode::Any if integral => Ok(Value::from(number as i64)),
            _ => Ok(Value::from(number)),
        }
    }
}

impl Validator for NumberValidator {
    fn tag(&self) -> TypeTag {
        TypeTag::Number
    }

    fn handle(&self, raw: Value, unit: UnitHandle) -> HandlerFuture {
        unit.settle(self.parse(&raw));
        resolved()
    }
}

/// Accepts booleans and case-insensitive `"true"`/`"false"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanValidator;

impl Validator for BooleanValidator {
    fn tag(&self) -> TypeTag {
        TypeTag::Boolean
    }

    fn handle(&self, raw: Value, unit: UnitHandle) -> HandlerFuture {
        let parsed = match &raw {
            Value::Bool(flag) => Some(*flag),
            Value::String(text) if text.eq_ignore_ascii_case("true") => Some(true),
            Value::String(text) if text.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        };
        match parsed {
            Some(flag) => unit.valid(Value::Bool(flag)),
            None => unit.invalid(GenericError::invalid_input("Invalid boolean")),
        };
        resolved()
    }
}

/// Configuration for [`UuidValidator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UuidConfig {
    /// Required UUID version, if any.
    pub version: Option<usize>,
    /// Replace invalid input with a fresh v4 UUID instead of failing.
    pub create_new_if_invalid: bool,
}

impl UuidConfig {
    /// Requires the given UUID version.
    #[must_use]
    pub const fn version(mut self, version: usize) -> Self {
        self.version = Some(version);
        self
    }

    /// Generates a fresh UUID when the input is invalid.
    #[must_use]
    pub const fn create_new_if_invalid(mut self, enabled: bool) -> Self {
        self.create_new_if_invalid = enabled;
        self
    }
}

/// Accepts UUID strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidValidator {
    config: UuidConfig,
}

impl UuidValidator {
    /// Creates a UUID validator with the given configuration.
    #[must_use]
    pub const fn new(config: UuidConfig) -> Self {
        Self { config }
    }

    fn parse(&self, raw: &Value) -> Option<Uuid> {
        let parsed = Uuid::parse_str(raw.as_str()?).ok()?;
        match self.config.version {
            Some(version) if parsed.get_version_num() != version => None,
            _ => Some(parsed),
        }
    }
}

impl Validator for UuidValidator {
    fn tag(&self) -> TypeTag {
        TypeTag::Uuid
    }

    fn handle(&self, raw: Value, unit: UnitHandle) -> HandlerFuture {
        match self.parse(&raw) {
            Some(parsed) => unit.valid(Value::String(parsed.hyphenated().to_string())),
            None if self.config.create_new_if_invalid => {
                unit.valid(Value::String(Uuid::new_v4().hyphenated().to_string()))
            }
            None => {
                let mut error = GenericError::invalid_input("Invalid uuid");
                if let Some(version) = self.config.version {
                    error = error.with_data(json!({ "version": version }));
                }
                unit.invalid(error)
            }
        };
        resolved()
    }
}

/// Accepts members of a closed set of primitive values.
#[derive(Debug, Clone)]
pub struct EnumValidator {
    values: Vec<Value>,
}

impl EnumValidator {
    /// Creates an enum validator over `values`.
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    fn matches(member: &Value, raw: &Value) -> bool {
        if member == raw {
            return true;
        }
        match (member, raw) {
            (Value::Number(_) | Value::Bool(_), Value::String(text)) => {
                member.to_string() == *text
            }
            _ => false,
        }
    }
}

impl Validator for EnumValidator {
    fn tag(&self) -> TypeTag {
        TypeTag::Enum
    }

    fn handle(&self, raw: Value, unit: UnitHandle) -> HandlerFuture {
        let invalid = || {
            GenericError::invalid_input("Invalid enum value")
                .with_data(json!({ "allowed": self.values }))
        };
        if raw.is_object() || raw.is_array() {
            unit.invalid(invalid());
            return resolved();
        }
        match self.values.iter().find(|member| Self::matches(member, &raw)) {
            Some(member) => unit.valid(member.clone()),
            None => unit.invalid(invalid()),
        };
        resolved()
    }
}

/// Accepts absent values, otherwise delegates to the inner leaf.
#[derive(Debug, Clone)]
pub struct OptionalValidator {
    inner: SharedValidator,
    default: Option<Value>,
}

impl Validator for OptionalValidator {
    fn tag(&self) -> TypeTag {
        self.inner.tag()
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn required(&self) -> Option<SharedValidator> {
        Some(Arc::clone(&self.inner))
    }

    fn handle(&self, raw: Value, unit: UnitHandle) -> HandlerFuture {
        let absent = match &raw {
            Value::Null => true,
            Value::String(text) => text.is_empty(),
            _ => false,
        };
        if absent {
            unit.valid(self.default.clone().unwrap_or(Value::Null));
            return resolved();
        }

        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let result = ValidationUnit::new(inner, raw).execute().await;
            unit.settle(result);
            Ok(())
        })
    }
}

/// Accepts arrays whose every element passes the inner leaf.
#[derive(Debug, Clone)]
pub struct ArrayValidator {
    inner: SharedValidator,
}

impl Validator for ArrayValidator {
    fn tag(&self) -> TypeTag {
        TypeTag::Array(Box::new(self.inner.tag()))
    }

    fn handle(&self, raw: Value, unit: UnitHandle) -> HandlerFuture {
        let Value::Array(items) = raw else {
            unit.invalid(GenericError::invalid_input("Invalid array"));
            return resolved();
        };

        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let mut validated = Vec::with_capacity(items.len());
            for item in items {
                match ValidationUnit::new(Arc::clone(&inner), item).execute().await {
                    Ok(value) => validated.push(value),
                    Err(error) => {
                        unit.invalid(error);
                        return Ok(());
                    }
                }
            }
            unit.valid(Value::Array(validated));
            Ok(())
        })
    }
}

type CustomFn = dyn Fn(Value) -> BoxFuture<'static, Result<Value, GenericError>> + Send + Sync;

/// Wraps a user-supplied validation function.
#[derive(Clone)]
pub struct CustomValidator {
    func: Arc<CustomFn>,
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValidator").finish_non_exhaustive()
    }
}

impl Validator for CustomValidator {
    fn tag(&self) -> TypeTag {
        TypeTag::Custom
    }

    fn handle(&self, raw: Value, unit: UnitHandle) -> HandlerFuture {
        let pending = (self.func)(raw);
        Box::pin(async move {
            unit.settle(pending.await);
            Ok(())
        })
    }
}

/// Creates a string leaf.
#[must_use]
pub fn string() -> SharedValidator {
    Arc::new(StringValidator)
}

/// Creates a number leaf accepting integers and floats.
#[must_use]
pub fn number() -> SharedValidator {
    Arc::new(NumberValidator::new(NumberMode::Any))
}

/// Creates a number leaf accepting integers only.
#[must_use]
pub fn integer() -> SharedValidator {
    Arc::new(NumberValidator::new(NumberMode::Integer))
}

/// Creates a number leaf that always yields floats.
#[must_use]
pub fn float() -> SharedValidator {
    Arc::new(NumberValidator::new(NumberMode::Float))
}

/// Creates a boolean leaf.
#[must_use]
pub fn boolean() -> SharedValidator {
    Arc::new(BooleanValidator)
}

/// Creates a UUID leaf accepting any version.
#[must_use]
pub fn uuid() -> SharedValidator {
    Arc::new(UuidValidator::default())
}

/// Creates a configured UUID leaf.
#[must_use]
pub fn uuid_with(config: UuidConfig) -> SharedValidator {
    Arc::new(UuidValidator::new(config))
}

/// Creates an enum leaf over a closed set of primitives.
#[must_use]
pub fn one_of<I, V>(values: I) -> SharedValidator
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Arc::new(EnumValidator::new(values.into_iter().map(Into::into).collect()))
}

/// Makes `inner` tolerate absence, yielding `null`.
#[must_use]
pub fn optional(inner: SharedValidator) -> SharedValidator {
    Arc::new(OptionalValidator {
        inner,
        default: None,
    })
}

/// Makes `inner` tolerate absence, yielding `default`.
#[must_use]
pub fn optional_or(inner: SharedValidator, default: impl Into<Value>) -> SharedValidator {
    Arc::new(OptionalValidator {
        inner,
        default: Some(default.into()),
    })
}

/// Validates every element of an array with `inner`.
#[must_use]
pub fn array(inner: SharedValidator) -> SharedValidator {
    Arc::new(ArrayValidator { inner })
}

/// Wraps a synchronous validation function.
#[must_use]
pub fn custom<F>(func: F) -> SharedValidator
where
    F: Fn(Value) -> Result<Value, GenericError> + Send + Sync + 'static,
{
    Arc::new(CustomValidator {
        func: Arc::new(move |raw: Value| -> BoxFuture<'static, Result<Value, GenericError>> {
            Box::pin(std::future::ready(func(raw)))
        }),
    })
}

/// Wraps an asynchronous validation function.
#[must_use]
pub fn custom_async<F, Fut>(func: F) -> SharedValidator
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, GenericError>> + Send + 'static,
{
    Arc::new(CustomValidator {
        func: Arc::new(move |raw: Value| -> BoxFuture<'static, Result<Value, GenericError>> {
            Box::pin(func(raw))
        }),
    })
}
