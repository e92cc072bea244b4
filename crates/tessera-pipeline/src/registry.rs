//! Explicit route registry.
//!
//! A [`Registry`] is a plain value owned by whatever binds the transport. It
//! maps a route key to a [`Route`], and a route maps HTTP methods to
//! [`BoundRoute`]s. Dispatch always ends in exactly one reply: an unknown
//! route key is answered with 404 and an unbound method with 405.

use crate::binder::{Binder, BoundRoute};
use crate::pipeline::{reject, PipelineOutcome};
use crate::reply::Reply;
use crate::request::InboundRequest;
use http::header::ALLOW;
use http::Method;
use indexmap::IndexMap;
use tessera_core::GenericError;

/// The bound methods of one route key.
///
/// # Example
///
/// ```
/// use http::Method;
/// use tessera_pipeline::{Binder, CallbackOutput, Route};
///
/// let route = Route::new()
///     .bind(Binder::new(Method::GET).handler(|_| async { Ok(CallbackOutput::default()) }))
///     .unwrap();
///
/// assert!(route.get(&Method::GET).is_some());
/// assert_eq!(route.allowed_methods(), vec![Method::GET]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Route {
    methods: IndexMap<Method, BoundRoute>,
}

impl Route {
    /// Creates a route with no methods.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `binder` and adds it.
    ///
    /// # Errors
    ///
    /// Returns the bind error of `binder`.
    pub fn bind(mut self, binder: Binder) -> Result<Self, GenericError> {
        self.insert(binder.bind()?);
        Ok(self)
    }

    /// Adds a bound method, returning the one it replaces.
    pub fn insert(&mut self, route: BoundRoute) -> Option<BoundRoute> {
        let replaced = self.methods.insert(route.method().clone(), route);
        if let Some(previous) = &replaced {
            tracing::warn!(method = %previous.method(), "bound method replaced");
        }
        replaced
    }

    /// Returns the route bound for `method`.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&BoundRoute> {
        self.methods.get(method)
    }

    /// Returns the bound methods, in binding order.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.methods.keys().cloned().collect()
    }

    /// Returns true if any methods are bound.
    #[must_use]
    pub fn has_any_method(&self) -> bool {
        !self.methods.is_empty()
    }
}

/// Route keys to routes.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    routes: IndexMap<String, Route>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the route under `key`.
    #[must_use]
    pub fn route(mut self, key: impl Into<String>, route: Route) -> Self {
        self.insert(key, route);
        self
    }

    /// Adds or replaces the route under `key`, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, route: Route) -> Option<Route> {
        self.routes.insert(key.into(), route)
    }

    /// Binds `binder` under `key`, next to any methods already bound there.
    ///
    /// # Errors
    ///
    /// Returns the bind error of `binder`.
    pub fn bind(&mut self, key: impl Into<String>, binder: Binder) -> Result<(), GenericError> {
        let bound = binder.bind()?;
        self.routes.entry(key.into()).or_default().insert(bound);
        Ok(())
    }

    /// Returns the route under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Route> {
        self.routes.get(key)
    }

    /// Returns the number of route keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Serves `request` for route `key` and sends exactly one reply.
    pub async fn dispatch(
        &self,
        key: &str,
        request: InboundRequest,
        reply: &dyn Reply,
    ) -> PipelineOutcome {
        let Some(route) = self.routes.get(key) else {
            return reject(key, GenericError::no_handler(key), IndexMap::new(), reply).await;
        };

        match route.get(&request.method) {
            Some(bound) => bound.handle(key, request, reply).await,
            None => {
                let allow = route
                    .allowed_methods()
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                let headers = IndexMap::from([(ALLOW.as_str().to_string(), allow)]);
                let error = GenericError::method_not_available(&request.method);
                reject(key, error, headers, reply).await
            }
        }
    }
}
