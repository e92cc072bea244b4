//! Middleware context types.
//!
//! The [`MiddlewareContext`] is the request-facing view handed to each
//! middleware. It exposes the validated request data read-only and collects
//! headers and cookies into a per-middleware [`Effects`] accumulator. The
//! context is cheap to clone; clones share the same accumulator, so effects
//! set before a middleware fails or panics are still collected.

use crate::cookie::{Cookie, CookieOptions};
use crate::effects::{Effects, Trigger};
use crate::middleware::Stage;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tessera_schema::CustomResults;

/// Validated request data shared by every middleware of a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestView {
    /// Validated body.
    pub body: Value,
    /// Validated query.
    pub query: Value,
    /// Validated headers, keyed by lowercased name.
    pub headers: Value,
    /// Validated cookies.
    pub cookies: Value,
    /// Route parameters extracted by the transport.
    pub params: IndexMap<String, String>,
    /// Custom-leaf results of every category, by contributor.
    pub custom: CustomResults,
}

/// Context handed to a middleware for one stage.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use tessera_middleware::{MiddlewareContext, RequestView, Stage, Trigger};
///
/// let view = RequestView { body: json!({ "user": "ada" }), ..RequestView::default() };
/// let ctx = MiddlewareContext::new("auth", Stage::Before, Arc::new(view));
///
/// assert_eq!(ctx.body()["user"], "ada");
/// ctx.set_header("x-user", "ada");
/// ctx.set_cookie_on(Trigger::OnFailure, "retry", "1");
///
/// let effects = ctx.take_effects();
/// assert_eq!(effects.resolve(true).headers["x-user"], "ada");
/// assert_eq!(effects.resolve(false).cookies[0].name(), "retry");
/// ```
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    key: Arc<str>,
    stage: Stage,
    request: Arc<RequestView>,
    response: Option<Arc<Value>>,
    cookie_defaults: Arc<CookieOptions>,
    effects: Arc<Mutex<Effects>>,
}

impl MiddlewareContext {
    /// Creates a context for middleware `key` in `stage`.
    #[must_use]
    pub fn new(key: impl Into<Arc<str>>, stage: Stage, request: Arc<RequestView>) -> Self {
        Self {
            key: key.into(),
            stage,
            request,
            response: None,
            cookie_defaults: Arc::default(),
            effects: Arc::default(),
        }
    }

    /// Attaches the callback's output body (after stage).
    #[must_use]
    pub fn with_response(mut self, response: Option<Arc<Value>>) -> Self {
        self.response = response;
        self
    }

    /// Sets the options used by [`set_cookie`](Self::set_cookie).
    #[must_use]
    pub fn with_cookie_defaults(mut self, defaults: Arc<CookieOptions>) -> Self {
        self.cookie_defaults = defaults;
        self
    }

    /// Returns the middleware key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the running stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the whole request view.
    #[must_use]
    pub fn request(&self) -> &RequestView {
        &self.request
    }

    /// Returns the validated body.
    #[must_use]
    pub fn body(&self) -> &Value {
        &self.request.body
    }

    /// Returns the validated query.
    #[must_use]
    pub fn query(&self) -> &Value {
        &self.request.query
    }

    /// Returns the validated headers.
    #[must_use]
    pub fn headers(&self) -> &Value {
        &self.request.headers
    }

    /// Returns one validated header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers
            .get(name.to_ascii_lowercase())
            .and_then(Value::as_str)
    }

    /// Returns the validated cookies.
    #[must_use]
    pub fn cookies(&self) -> &Value {
        &self.request.cookies
    }

    /// Returns one route parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.params.get(name).map(String::as_str)
    }

    /// Returns the results of the custom leaves this middleware declared,
    /// by dotted path.
    #[must_use]
    pub fn custom(&self) -> Option<&IndexMap<String, Value>> {
        self.request.custom.get(&*self.key)
    }

    /// Returns the callback's output body, if the callback succeeded.
    #[must_use]
    pub fn response(&self) -> Option<&Value> {
        self.response.as_deref()
    }

    /// Sets a header applied to a success reply.
    pub fn set_header(&self, name: &str, value: impl Into<String>) {
        self.set_header_on(Trigger::OnSuccess, name, value);
    }

    /// Sets a header for `trigger`.
    pub fn set_header_on(&self, trigger: Trigger, name: &str, value: impl Into<String>) {
        self.effects.lock().set_header(trigger, name, value);
    }

    /// Sets a cookie with the default options, applied to a success reply.
    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        self.set_cookie_on(Trigger::OnSuccess, name, value);
    }

    /// Sets a cookie with the default options for `trigger`.
    pub fn set_cookie_on(
        &self,
        trigger: Trigger,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        let cookie = Cookie::new(name, value).with_options((*self.cookie_defaults).clone());
        self.effects.lock().set_cookie(trigger, cookie);
    }

    /// Sets a fully specified cookie for `trigger`.
    pub fn set_cookie_with(&self, trigger: Trigger, cookie: Cookie) {
        self.effects.lock().set_cookie(trigger, cookie);
    }

    /// Takes the effects collected so far, leaving the accumulator empty.
    #[must_use]
    pub fn take_effects(&self) -> Effects {
        std::mem::take(&mut *self.effects.lock())
    }
}
