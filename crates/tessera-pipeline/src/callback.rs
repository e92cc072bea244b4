//! Route callbacks.
//!
//! The callback is the route's own logic. It runs after every before-middleware
//! succeeded, sees the validated request and the data each middleware
//! returned, and produces a [`CallbackOutput`] that is validated against the
//! route's output schemas before it is sent.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tessera_core::Thrown;
use tessera_middleware::{Cookie, CookieOptions, RequestView};
use tessera_schema::BoxFuture;

/// Contributor id under which the route's own schema fragments are merged.
pub const ROUTE_CONTRIBUTOR: &str = "route";

/// Future returned by a route callback.
pub type CallbackFuture = BoxFuture<'static, Result<CallbackOutput, Thrown>>;

/// A type-erased route callback.
pub type SharedCallback = Arc<dyn Fn(CallbackContext) -> CallbackFuture + Send + Sync>;

/// Wraps an async closure as a [`SharedCallback`].
pub fn callback<F, Fut>(handler: F) -> SharedCallback
where
    F: Fn(CallbackContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CallbackOutput, Thrown>> + Send + 'static,
{
    Arc::new(move |ctx| -> CallbackFuture { Box::pin(handler(ctx)) })
}

/// What the route callback sees.
///
/// Cookies set here are sent only with a success reply.
#[derive(Clone)]
pub struct CallbackContext {
    request: Arc<RequestView>,
    middleware: Arc<IndexMap<String, Value>>,
    cookie_defaults: Arc<CookieOptions>,
    cookies: Arc<Mutex<IndexMap<String, Cookie>>>,
}

impl fmt::Debug for CallbackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackContext")
            .field("request", &self.request)
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}

impl CallbackContext {
    /// Creates a callback context.
    #[must_use]
    pub fn new(
        request: Arc<RequestView>,
        middleware: IndexMap<String, Value>,
        cookie_defaults: Arc<CookieOptions>,
    ) -> Self {
        Self {
            request,
            middleware: Arc::new(middleware),
            cookie_defaults,
            cookies: Arc::default(),
        }
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

    /// Returns the data a before-middleware returned.
    #[must_use]
    pub fn middleware_data(&self, key: &str) -> Option<&Value> {
        self.middleware.get(key)
    }

    /// Returns the results of the route's own custom leaves.
    #[must_use]
    pub fn custom(&self) -> Option<&IndexMap<String, Value>> {
        self.request.custom.get(ROUTE_CONTRIBUTOR)
    }

    /// Sets a cookie with the route's default options.
    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        let cookie = Cookie::new(name, value).with_options((*self.cookie_defaults).clone());
        self.set_cookie_with(cookie);
    }

    /// Sets a fully specified cookie.
    pub fn set_cookie_with(&self, cookie: Cookie) {
        self.cookies.lock().insert(cookie.name().to_string(), cookie);
    }

    /// Takes the cookies set so far.
    #[must_use]
    pub fn take_cookies(&self) -> Vec<Cookie> {
        std::mem::take(&mut *self.cookies.lock())
            .into_values()
            .collect()
    }
}

/// What the route callback returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackOutput {
    /// Response body.
    pub body: Value,
    /// Response headers. Names are lowercased when the reply is built.
    pub headers: IndexMap<String, String>,
    /// Status override; the route's success status is used otherwise.
    pub status: Option<u16>,
}

impl CallbackOutput {
    /// Creates an output with `body`.
    #[must_use]
    pub fn new(body: impl Into<Value>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Adds a response header.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Overrides the status code.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}
