//! Concurrent stage execution.
//!
//! The [`MiddlewareRunner`] runs every middleware that handles a stage
//! concurrently and waits for all of them, whatever their individual
//! outcomes. A panic inside a middleware is caught and reported as that
//! middleware's failure. The stage succeeds only if every member succeeded.

use crate::context::{MiddlewareContext, RequestView};
use crate::cookie::CookieOptions;
use crate::effects::Effects;
use crate::middleware::{SharedMiddleware, Stage};
use futures_util::future::join_all;
use futures_util::FutureExt;
use indexmap::IndexMap;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tessera_core::{GenericError, Thrown};

/// Result of one middleware in one stage.
#[derive(Debug, Clone)]
pub struct MiddlewareOutcome {
    /// Middleware key.
    pub key: String,
    /// Whether the middleware returned successfully.
    pub success: bool,
    /// Data returned by the middleware (`null` on failure).
    pub data: Value,
    /// Canonicalized failure, if any.
    pub error: Option<GenericError>,
    /// Headers and cookies the middleware set, regardless of outcome.
    pub effects: Effects,
}

/// Outcomes of every middleware that ran in a stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    /// The stage that ran.
    pub stage: Stage,
    /// One outcome per middleware, in attachment order.
    pub outcomes: Vec<MiddlewareOutcome>,
}

impl StageReport {
    /// Returns `true` if every middleware succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.success)
    }

    /// Iterates over the failures, in attachment order.
    pub fn errors(&self) -> impl Iterator<Item = &GenericError> {
        self.outcomes.iter().filter_map(|outcome| outcome.error.as_ref())
    }

    /// Returns the data of every successful middleware, by key.
    #[must_use]
    pub fn data(&self) -> IndexMap<String, Value> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.success)
            .map(|outcome| (outcome.key.clone(), outcome.data.clone()))
            .collect()
    }

    /// Merges every middleware's effects, in attachment order.
    #[must_use]
    pub fn effects(&self) -> Effects {
        self.outcomes.iter().fold(Effects::new(), |mut merged, outcome| {
            merged.absorb(outcome.effects.clone());
            merged
        })
    }
}

/// Runs the middleware attached to a route.
#[derive(Clone, Default)]
pub struct MiddlewareRunner {
    middleware: Vec<SharedMiddleware>,
    cookie_defaults: Arc<CookieOptions>,
}

impl std::fmt::Debug for MiddlewareRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.middleware.iter().map(|mw| mw.name()).collect();
        f.debug_struct("MiddlewareRunner")
            .field("middleware", &keys)
            .field("cookie_defaults", &self.cookie_defaults)
            .finish()
    }
}

impl MiddlewareRunner {
    /// Creates a runner over `middleware`, in attachment order.
    #[must_use]
    pub fn new(middleware: Vec<SharedMiddleware>) -> Self {
        Self {
            middleware,
            cookie_defaults: Arc::default(),
        }
    }

    /// Sets the options used by context `set_cookie` calls.
    #[must_use]
    pub fn with_cookie_defaults(mut self, defaults: CookieOptions) -> Self {
        self.cookie_defaults = Arc::new(defaults);
        self
    }

    /// Returns the attached middleware.
    #[must_use]
    pub fn middleware(&self) -> &[SharedMiddleware] {
        &self.middleware
    }

    /// Runs every middleware handling `stage` and waits for all of them.
    pub async fn run(
        &self,
        stage: Stage,
        request: Arc<RequestView>,
        response: Option<Arc<Value>>,
    ) -> StageReport {
        let runs = self
            .middleware
            .iter()
            .filter(|mw| mw.handles(stage))
            .map(|mw| {
                let ctx = MiddlewareContext::new(mw.name(), stage, Arc::clone(&request))
                    .with_response(response.clone())
                    .with_cookie_defaults(Arc::clone(&self.cookie_defaults));
                run_one(Arc::clone(mw), stage, ctx)
            });

        let outcomes = join_all(runs).await;
        let report = StageReport { stage, outcomes };
        tracing::debug!(
            stage = %stage,
            ran = report.outcomes.len(),
            success = report.success(),
            "middleware stage finished"
        );
        report
    }
}

async fn run_one(mw: SharedMiddleware, stage: Stage, ctx: MiddlewareContext) -> MiddlewareOutcome {
    let key = mw.name().to_string();

    let started = std::panic::catch_unwind(AssertUnwindSafe(|| mw.execute(stage, ctx.clone())));
    let result = match started {
        Ok(future) => match AssertUnwindSafe(future).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(Thrown::from_panic(payload)),
        },
        Err(payload) => Err(Thrown::from_panic(payload)),
    };
    let effects = ctx.take_effects();

    match result {
        Ok(data) => {
            tracing::trace!(middleware = %key, stage = %stage, "middleware succeeded");
            MiddlewareOutcome {
                key,
                success: true,
                data,
                error: None,
                effects,
            }
        }
        Err(thrown) => {
            let fallback = GenericError::middleware(format!("Middleware '{key}' failed"));
            let hint = format!("raised by middleware '{key}' during the {stage} stage");
            let error = GenericError::from_unknown(thrown, Some(fallback), Some(&hint));
            tracing::warn!(
                middleware = %key,
                stage = %stage,
                error_id = %error.id(),
                error = %error,
                "middleware failed"
            );
            MiddlewareOutcome {
                key,
                success: false,
                data: Value::Null,
                error: Some(error),
                effects,
            }
        }
    }
}
