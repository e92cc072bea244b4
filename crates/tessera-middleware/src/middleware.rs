//! Core middleware trait and types.
//!
//! A middleware participates in one or both stages around a route callback.
//! It may contribute input and output schema fragments, which are merged into
//! the route's schemas when the route is bound, and it returns free-form data
//! that the route callback can read by the middleware's key.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tessera_middleware::{FnMiddleware, Middleware, Stage, Trigger};
//!
//! let audit = FnMiddleware::new("audit")
//!     .before(|ctx| async move {
//!         ctx.set_header_on(Trigger::OnBoth, "x-audited", "1");
//!         Ok(json!({ "seen": true }))
//!     });
//!
//! assert!(audit.handles(Stage::Before));
//! assert!(!audit.handles(Stage::After));
//! ```

use crate::context::MiddlewareContext;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tessera_core::{GenericError, Thrown};
use tessera_schema::{BoxFuture, InputSchemas, OutputSchemas};

/// Future returned by a middleware stage.
pub type MiddlewareFuture = BoxFuture<'static, Result<Value, Thrown>>;

/// A middleware shared between routes.
pub type SharedMiddleware = Arc<dyn Middleware>;

/// Stage a middleware runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// After validation, before the route callback.
    Before,
    /// After the route callback, for every request.
    After,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::After => write!(f, "after"),
        }
    }
}

/// The core middleware trait.
///
/// # Invariants
///
/// - Siblings in one stage run concurrently; a middleware must not rely on
///   another having run first
/// - Headers and cookies set through the context are kept even when the
///   middleware fails
pub trait Middleware: Send + Sync + 'static {
    /// Returns the middleware key.
    ///
    /// The key identifies the middleware in logs, in custom-leaf results and
    /// in the data handed to the route callback.
    fn name(&self) -> &str;

    /// Input schema fragments contributed to every route using this
    /// middleware.
    fn input_schemas(&self) -> InputSchemas {
        InputSchemas::default()
    }

    /// Output schema fragments contributed to every route using this
    /// middleware.
    fn output_schemas(&self) -> OutputSchemas {
        OutputSchemas::default()
    }

    /// Returns `true` if the middleware runs in `stage`.
    fn handles(&self, stage: Stage) -> bool;

    /// Runs the middleware for `stage`.
    ///
    /// Only called for stages where [`handles`](Self::handles) is `true`.
    fn execute(&self, stage: Stage, ctx: MiddlewareContext) -> MiddlewareFuture;
}

type StageHandler = Arc<dyn Fn(MiddlewareContext) -> MiddlewareFuture + Send + Sync>;

/// A middleware built from closures.
#[derive(Clone)]
pub struct FnMiddleware {
    name: String,
    input: InputSchemas,
    output: OutputSchemas,
    before: Option<StageHandler>,
    after: Option<StageHandler>,
}

impl fmt::Debug for FnMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish_non_exhaustive()
    }
}

fn boxed<F, Fut>(handler: F) -> StageHandler
where
    F: Fn(MiddlewareContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, Thrown>> + Send + 'static,
{
    Arc::new(move |ctx| -> MiddlewareFuture { Box::pin(handler(ctx)) })
}

impl FnMiddleware {
    /// Creates a middleware with no stages.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: InputSchemas::default(),
            output: OutputSchemas::default(),
            before: None,
            after: None,
        }
    }

    /// Sets the input schema contribution.
    #[must_use]
    pub fn input(mut self, schemas: InputSchemas) -> Self {
        self.input = schemas;
        self
    }

    /// Sets the output schema contribution.
    #[must_use]
    pub fn output(mut self, schemas: OutputSchemas) -> Self {
        self.output = schemas;
        self
    }

    /// Sets the before-stage handler.
    #[must_use]
    pub fn before<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(MiddlewareContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Thrown>> + Send + 'static,
    {
        self.before = Some(boxed(handler));
        self
    }

    /// Sets the after-stage handler.
    #[must_use]
    pub fn after<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(MiddlewareContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Thrown>> + Send + 'static,
    {
        self.after = Some(boxed(handler));
        self
    }

    /// Wraps the middleware for sharing.
    #[must_use]
    pub fn shared(self) -> SharedMiddleware {
        Arc::new(self)
    }

    fn handler(&self, stage: Stage) -> Option<&StageHandler> {
        match stage {
            Stage::Before => self.before.as_ref(),
            Stage::After => self.after.as_ref(),
        }
    }
}

impl Middleware for FnMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_schemas(&self) -> InputSchemas {
        self.input.clone()
    }

    fn output_schemas(&self) -> OutputSchemas {
        self.output.clone()
    }

    fn handles(&self, stage: Stage) -> bool {
        self.handler(stage).is_some()
    }

    fn execute(&self, stage: Stage, ctx: MiddlewareContext) -> MiddlewareFuture {
        match self.handler(stage) {
            Some(handler) => handler(ctx),
            None => {
                let error = GenericError::missing_middleware_handler(self.name.as_str());
                Box::pin(std::future::ready(Err::<Value, Thrown>(error.into())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestView;
    use serde_json::json;
    use tessera_core::ErrorKind;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Before.to_string(), "before");
        assert_eq!(Stage::After.to_string(), "after");
    }

    #[test]
    fn test_handles_reflects_configured_stages() {
        let mw = FnMiddleware::new("both")
            .before(|_| async { Ok(Value::Null) })
            .after(|_| async { Ok(Value::Null) });
        assert!(mw.handles(Stage::Before));
        assert!(mw.handles(Stage::After));
        assert!(!FnMiddleware::new("none").handles(Stage::Before));
    }

    #[tokio::test]
    async fn test_execute_runs_handler() {
        let mw = FnMiddleware::new("echo").before(|ctx| async move { Ok(ctx.body().clone()) });
        let view = RequestView {
            body: json!({"a": 1}),
            ..RequestView::default()
        };
        let ctx = MiddlewareContext::new("echo", Stage::Before, Arc::new(view));
        assert_eq!(mw.execute(Stage::Before, ctx).await.unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_unconfigured_stage_is_missing_handler() {
        let mw = FnMiddleware::new("partial").before(|_| async { Ok(Value::Null) });
        let ctx = MiddlewareContext::new("partial", Stage::After, Arc::default());
        let thrown = mw.execute(Stage::After, ctx).await.unwrap_err();
        let error = GenericError::from_unknown(thrown, None, None);
        assert_eq!(error.kind(), ErrorKind::MissingMiddlewareHandler);
    }
}
