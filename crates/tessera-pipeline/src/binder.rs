//! Route binding.
//!
//! A [`Binder`] collects everything a route needs for one HTTP method: the
//! attached middleware, the route's own schema fragments, cookie defaults and
//! the callback. [`Binder::bind`] composes every fragment into one schema per
//! category and returns an immutable [`BoundRoute`]. Composition never runs
//! again on the request path.

use crate::callback::{callback, CallbackContext, CallbackOutput, SharedCallback, ROUTE_CONTRIBUTOR};
use crate::pipeline::{PipelineOutcome, RequestPipeline};
use crate::reply::Reply;
use crate::request::InboundRequest;
use http::{Method, StatusCode};
use indexmap::IndexSet;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tessera_config::TesseraConfig;
use tessera_core::{GenericError, Thrown};
use tessera_middleware::{
    CookieOptions, MiddlewareRunner, SameSite, SharedMiddleware, Stage,
};
use tessera_schema::{
    compose_input, compose_output, ComposedInput, ComposedOutput, InputSchemas, OutputSchemas,
};

/// Builder for one route method.
///
/// # Example
///
/// ```
/// use http::Method;
/// use serde_json::json;
/// use tessera_pipeline::{Binder, CallbackOutput};
/// use tessera_schema::{leaf, InputSchemas, Schema};
///
/// let route = Binder::new(Method::POST)
///     .input(InputSchemas::new().body(Schema::new().field("name", leaf::string())))
///     .handler(|ctx| async move {
///         Ok(CallbackOutput::new(json!({ "hello": ctx.body()["name"] })))
///     })
///     .bind()
///     .unwrap();
///
/// assert_eq!(route.method(), &Method::POST);
/// ```
pub struct Binder {
    method: Method,
    middleware: Vec<SharedMiddleware>,
    input: InputSchemas,
    output: OutputSchemas,
    cookie_defaults: CookieOptions,
    success_status: StatusCode,
    callback: Option<SharedCallback>,
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.middleware.iter().map(|mw| mw.name()).collect();
        f.debug_struct("Binder")
            .field("method", &self.method)
            .field("middleware", &keys)
            .field("success_status", &self.success_status)
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

impl Binder {
    /// Starts a binder for `method`.
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            middleware: Vec::new(),
            input: InputSchemas::default(),
            output: OutputSchemas::default(),
            cookie_defaults: CookieOptions::default(),
            success_status: StatusCode::OK,
            callback: None,
        }
    }

    /// Attaches a middleware. Attachment order is the fragment merge order.
    #[must_use]
    pub fn middleware(mut self, middleware: SharedMiddleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Sets the route's own input fragments.
    #[must_use]
    pub fn input(mut self, schemas: InputSchemas) -> Self {
        self.input = schemas;
        self
    }

    /// Sets the route's own output fragments.
    #[must_use]
    pub fn output(mut self, schemas: OutputSchemas) -> Self {
        self.output = schemas;
        self
    }

    /// Sets the options used by every `set_cookie` call on this route.
    #[must_use]
    pub fn cookie_defaults(mut self, options: CookieOptions) -> Self {
        self.cookie_defaults = options;
        self
    }

    /// Sets the status of a success reply when the callback sets none.
    #[must_use]
    pub fn success_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }

    /// Takes cookie defaults and the success status from `config`.
    ///
    /// # Errors
    ///
    /// Returns a pipeline error if the configuration holds values that were
    /// never validated (an unknown same-site mode or a bad status code).
    pub fn configure(mut self, config: &TesseraConfig) -> Result<Self, GenericError> {
        self.cookie_defaults = cookie_options(config)?;
        self.success_status = StatusCode::from_u16(config.pipeline.default_success_status)
            .map_err(|e| {
                GenericError::pipeline(format!("Invalid default success status: {e}"))
                    .with_hint("validate the configuration before binding routes")
            })?;
        Ok(self)
    }

    /// Sets the route callback.
    #[must_use]
    pub fn handler<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(CallbackContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallbackOutput, Thrown>> + Send + 'static,
    {
        self.shared_handler(callback(handler))
    }

    /// Sets an already type-erased route callback.
    #[must_use]
    pub fn shared_handler(mut self, handler: SharedCallback) -> Self {
        self.callback = Some(handler);
        self
    }

    /// Composes the route's schemas and freezes it.
    ///
    /// # Errors
    ///
    /// - pipeline error when no callback was set
    /// - missing-middleware-handler error for a middleware that handles
    ///   neither stage
    /// - schema-composition error for a duplicate middleware key, a
    ///   middleware keyed like the route, or conflicting fragments
    pub fn bind(self) -> Result<BoundRoute, GenericError> {
        let callback = self.callback.ok_or_else(|| {
            GenericError::pipeline(format!("No callback bound for {}", self.method))
                .with_hint("call Binder::handler before bind")
        })?;

        let mut keys = IndexSet::with_capacity(self.middleware.len());
        for mw in &self.middleware {
            let key = mw.name();
            if key == ROUTE_CONTRIBUTOR {
                return Err(GenericError::composition(format!(
                    "Middleware key '{key}' is reserved for the route"
                )));
            }
            if !keys.insert(key) {
                return Err(GenericError::composition(format!(
                    "Middleware '{key}' is attached twice"
                )));
            }
            if !mw.handles(Stage::Before) && !mw.handles(Stage::After) {
                return Err(GenericError::missing_middleware_handler(key));
            }
        }

        let inputs: Vec<(&str, InputSchemas)> = self
            .middleware
            .iter()
            .map(|mw| (mw.name(), mw.input_schemas()))
            .chain(std::iter::once((ROUTE_CONTRIBUTOR, self.input.clone())))
            .collect();
        let outputs: Vec<(&str, OutputSchemas)> = self
            .middleware
            .iter()
            .map(|mw| (mw.name(), mw.output_schemas()))
            .chain(std::iter::once((ROUTE_CONTRIBUTOR, self.output.clone())))
            .collect();

        let input = compose_input(
            &inputs
                .iter()
                .map(|(key, schemas)| (*key, schemas))
                .collect::<Vec<_>>(),
        )?;
        let output = compose_output(
            &outputs
                .iter()
                .map(|(key, schemas)| (*key, schemas))
                .collect::<Vec<_>>(),
        )?;

        tracing::debug!(
            method = %self.method,
            middleware = self.middleware.len(),
            "route bound"
        );

        let cookie_defaults = Arc::new(self.cookie_defaults);
        let runner = MiddlewareRunner::new(self.middleware)
            .with_cookie_defaults((*cookie_defaults).clone());

        Ok(BoundRoute {
            inner: Arc::new(RouteInner {
                method: self.method,
                input,
                output,
                runner,
                callback,
                cookie_defaults,
                success_status: self.success_status,
            }),
        })
    }
}

fn cookie_options(config: &TesseraConfig) -> Result<CookieOptions, GenericError> {
    let defaults = &config.cookies;
    let same_site = SameSite::from_str(&defaults.same_site).map_err(|e| {
        GenericError::pipeline(e.to_string())
            .with_hint("validate the configuration before binding routes")
    })?;

    let mut options = CookieOptions::default()
        .path(defaults.path.clone())
        .same_site(same_site)
        .secure(defaults.secure)
        .http_only(defaults.http_only)
        .partitioned(defaults.partitioned);
    if let Some(domain) = &defaults.domain {
        options = options.domain(domain.clone());
    }
    if let Some(seconds) = defaults.max_age_secs {
        options = options.max_age(Duration::from_secs(seconds));
    }
    Ok(options)
}

pub(crate) struct RouteInner {
    pub(crate) method: Method,
    pub(crate) input: ComposedInput,
    pub(crate) output: ComposedOutput,
    pub(crate) runner: MiddlewareRunner,
    pub(crate) callback: SharedCallback,
    pub(crate) cookie_defaults: Arc<CookieOptions>,
    pub(crate) success_status: StatusCode,
}

/// A route method with its schemas composed, ready to serve requests.
///
/// Cloning is cheap; every clone shares the same composed schemas.
#[derive(Clone)]
pub struct BoundRoute {
    pub(crate) inner: Arc<RouteInner>,
}

impl fmt::Debug for BoundRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundRoute")
            .field("method", &self.inner.method)
            .field("runner", &self.inner.runner)
            .field("success_status", &self.inner.success_status)
            .finish_non_exhaustive()
    }
}

impl BoundRoute {
    /// Returns the bound method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// Returns the merged input schemas.
    #[must_use]
    pub fn input(&self) -> &ComposedInput {
        &self.inner.input
    }

    /// Returns the merged output schemas.
    #[must_use]
    pub fn output(&self) -> &ComposedOutput {
        &self.inner.output
    }

    /// Returns the keys of the attached middleware, in attachment order.
    #[must_use]
    pub fn middleware_keys(&self) -> Vec<&str> {
        self.inner
            .runner
            .middleware()
            .iter()
            .map(|mw| mw.name())
            .collect()
    }

    /// Returns the cookie defaults.
    #[must_use]
    pub fn cookie_defaults(&self) -> &CookieOptions {
        &self.inner.cookie_defaults
    }

    /// Returns the default success status.
    #[must_use]
    pub fn success_status(&self) -> StatusCode {
        self.inner.success_status
    }

    /// Runs one request through a fresh pipeline and sends exactly one reply.
    ///
    /// `route` labels the request in logs.
    pub async fn handle(
        &self,
        route: &str,
        request: InboundRequest,
        reply: &dyn Reply,
    ) -> PipelineOutcome {
        RequestPipeline::new(self.clone(), route).run(request, reply).await
    }
}
