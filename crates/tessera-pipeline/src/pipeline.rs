//! The per-request state machine.
//!
//! One [`RequestPipeline`] serves one request. Stages run strictly in order:
//!
//! 1. validate headers, cookies, query and body against the merged schemas
//! 2. before-middleware (concurrently), if validation passed
//! 3. the route callback and output validation, if every before-middleware
//!    succeeded
//! 4. after-middleware (concurrently), always
//! 5. exactly one terminal reply
//!
//! Headers and cookies set by middleware accumulate across stages and are
//! resolved against the terminal outcome only when the reply is built.

use crate::binder::BoundRoute;
use crate::callback::{CallbackContext, CallbackOutput};
use crate::reply::{ErrorEnvelope, Reply, ReplyGuard};
use crate::request::{InboundRequest, OutboundResponse};
use crate::state::{PipelineFlags, PipelineState};
use futures_util::FutureExt;
use http::StatusCode;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tessera_core::{debug_enabled, GenericError, Thrown};
use tessera_middleware::{render_set_cookie, Cookie, Cookies, Effects, RequestView, Stage, StageReport};
use tessera_schema::{Category, CustomResults, Schema, Validated};

/// What happened to one request.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Every state the pipeline passed through, in order.
    pub states: Vec<PipelineState>,
    /// Flags at the end of the request.
    pub flags: PipelineFlags,
    /// Every error pushed during the request, oldest first.
    pub errors: Vec<GenericError>,
    /// The reply that was handed to the transport.
    pub response: OutboundResponse,
    /// Transport failure, if the send itself failed.
    pub delivery_error: Option<GenericError>,
}

impl PipelineOutcome {
    /// Returns the terminal state.
    #[must_use]
    pub fn terminal(&self) -> Option<PipelineState> {
        self.states.last().copied().filter(|state| state.is_terminal())
    }

    /// Returns `true` if a success reply was sent.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.terminal() == Some(PipelineState::SendSuccess)
    }
}

/// Sends an error reply for a request no pipeline was found for (404, 405).
pub(crate) async fn reject(
    route: &str,
    error: GenericError,
    headers: IndexMap<String, String>,
    reply: &dyn Reply,
) -> PipelineOutcome {
    tracing::debug!(route = %route, error_id = %error.id(), error = %error, "request rejected");
    let errors = vec![error];
    let mut response = error_response(&errors, PipelineFlags::default());
    response.headers = headers;

    let mut guard = ReplyGuard::new(reply, route);
    let delivery_error = guard.send(response.clone()).await.err();

    PipelineOutcome {
        states: vec![PipelineState::Init, PipelineState::SendError],
        flags: PipelineFlags {
            reply_sent: guard.is_sent(),
            ..PipelineFlags::default()
        },
        errors,
        response,
        delivery_error,
    }
}

/// Drives one request through the stages of a [`BoundRoute`].
#[derive(Debug)]
pub struct RequestPipeline {
    route: BoundRoute,
    label: String,
    states: Vec<PipelineState>,
    flags: PipelineFlags,
    errors: Vec<GenericError>,
    effects: Effects,
}

struct CallbackResult {
    output: CallbackOutput,
    cookies: Vec<Cookie>,
}

impl RequestPipeline {
    /// Creates a pipeline in the `Init` state. `label` names the route in logs.
    #[must_use]
    pub fn new(route: BoundRoute, label: impl Into<String>) -> Self {
        Self {
            route,
            label: label.into(),
            states: vec![PipelineState::Init],
            flags: PipelineFlags::default(),
            errors: Vec::new(),
            effects: Effects::new(),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Init)
    }

    /// Runs the request to its terminal reply.
    pub async fn run(mut self, request: InboundRequest, reply: &dyn Reply) -> PipelineOutcome {
        let route = self.route.clone();
        let inner = &route.inner;

        self.transition(PipelineState::Validating);
        let view = match validate_request(&self.route, &request).await {
            Ok(view) => Arc::new(view),
            Err(error) => {
                self.flags.validate_failed = true;
                self.fail(PipelineState::ValidateFailed, error);
                Arc::new(RequestView {
                    params: request.params.clone(),
                    ..RequestView::default()
                })
            }
        };

        let mut callback_result = None;
        if !self.flags.validate_failed {
            self.transition(PipelineState::BeforeMiddlewareRunning);
            let report = inner.runner.run(Stage::Before, Arc::clone(&view), None).await;
            let before_ok = self.absorb(&report);

            if before_ok {
                self.transition(PipelineState::CallbackRunning);
                match self.run_callback(Arc::clone(&view), report.data()).await {
                    Ok(result) => callback_result = Some(result),
                    Err(error) => {
                        self.flags.callback_errored = true;
                        self.fail(PipelineState::CallbackFailed, error);
                    }
                }
            } else {
                self.flags.before_middleware_errored = true;
                self.transition(PipelineState::BeforeMiddlewareFailed);
            }
        }

        self.transition(PipelineState::AfterMiddlewareRunning);
        let response_body = callback_result
            .as_ref()
            .map(|result| Arc::new(result.output.body.clone()));
        let report = inner.runner.run(Stage::After, view, response_body).await;
        if !self.absorb(&report) {
            self.flags.after_middleware_errored = true;
            self.transition(PipelineState::AfterMiddlewareFailed);
        }

        let response = match callback_result {
            Some(result) if !self.flags.any_failed() => {
                self.transition(PipelineState::SendSuccess);
                self.success_response(result)
            }
            _ => {
                self.transition(PipelineState::SendError);
                self.failure_response()
            }
        };

        let mut guard = ReplyGuard::new(reply, &self.label);
        let delivery_error = guard.send(response.clone()).await.err();
        self.flags.reply_sent = guard.is_sent();

        PipelineOutcome {
            states: self.states,
            flags: self.flags,
            errors: self.errors,
            response,
            delivery_error,
        }
    }

    fn transition(&mut self, next: PipelineState) {
        let from = self.state();
        self.states.push(next);
        let method = self.route.method();
        if debug_enabled() {
            tracing::info!(route = %self.label, method = %method, from = %from, state = %next, "pipeline transition");
        } else {
            tracing::debug!(route = %self.label, method = %method, from = %from, state = %next, "pipeline transition");
        }
    }

    fn fail(&mut self, state: PipelineState, error: GenericError) {
        tracing::debug!(
            route = %self.label,
            state = %state,
            error_id = %error.id(),
            error = %error,
            "stage failed"
        );
        self.errors.push(error);
        self.transition(state);
    }

    /// Collects a stage's effects and errors; returns the stage's success.
    fn absorb(&mut self, report: &StageReport) -> bool {
        self.effects.absorb(report.effects());
        self.errors.extend(report.errors().cloned());
        report.success()
    }

    async fn run_callback(
        &self,
        view: Arc<RequestView>,
        middleware: IndexMap<String, Value>,
    ) -> Result<CallbackResult, GenericError> {
        let inner = &self.route.inner;
        let ctx = CallbackContext::new(view, middleware, Arc::clone(&inner.cookie_defaults));

        let started = std::panic::catch_unwind(AssertUnwindSafe(|| (inner.callback)(ctx.clone())));
        let result = match started {
            Ok(future) => match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(Thrown::from_panic(payload)),
            },
            Err(payload) => Err(Thrown::from_panic(payload)),
        };
        // cookies set before a failure are dropped with the failure
        let cookies = ctx.take_cookies();

        let mut output = result.map_err(|thrown| {
            GenericError::from_unknown(
                thrown,
                Some(GenericError::pipeline("Route callback failed")),
                Some("raised by the route callback"),
            )
        })?;

        if let Some(status) = output.status {
            if StatusCode::from_u16(status).is_err() {
                return Err(GenericError::pipeline(format!(
                    "Route callback returned invalid status {status}"
                )));
            }
        }

        let output_schemas = &inner.output;
        if !output_schemas.body.is_empty() {
            output.body = output_schemas
                .body
                .validate(&output.body)
                .await
                .map_err(|e| output_error(Category::Body, e))?
                .into_data();
        }
        if !output_schemas.headers.is_empty() {
            output_schemas
                .headers
                .validate(&output.headers)
                .map_err(|e| output_error(Category::Headers, e))?;
        }

        Ok(CallbackResult { output, cookies })
    }

    fn success_response(&self, result: CallbackResult) -> OutboundResponse {
        let CallbackResult { output, cookies } = result;
        let resolved = self.effects.resolve(true);

        let status = output
            .status
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(self.route.inner.success_status);

        let mut headers = resolved.headers;
        headers.extend(
            output
                .headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value)),
        );

        let mut by_name: IndexMap<String, Cookie> = resolved
            .cookies
            .into_iter()
            .map(|cookie| (cookie.name().to_string(), cookie))
            .collect();
        for cookie in cookies {
            by_name.insert(cookie.name().to_string(), cookie);
        }

        OutboundResponse {
            status,
            headers,
            set_cookie: render_set_cookie(by_name.values()),
            body: output.body,
        }
    }

    fn failure_response(&self) -> OutboundResponse {
        let resolved = self.effects.resolve(false);
        let mut response = error_response(&self.errors, self.flags);
        response.headers = resolved.headers;
        response.set_cookie = render_set_cookie(&resolved.cookies);
        response
    }
}

fn output_error(category: Category, error: GenericError) -> GenericError {
    let mut wrapper = GenericError::pipeline(format!("Route output {category} failed validation"))
        .with_hint("the route callback returned data its output schema does not accept");
    wrapper.add_error(error);
    wrapper
}

fn error_response(errors: &[GenericError], flags: PipelineFlags) -> OutboundResponse {
    match ErrorEnvelope::from_errors(errors, flags) {
        Some(envelope) => {
            let status = errors
                .last()
                .map(GenericError::status_code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            OutboundResponse::new(status, envelope.to_value())
        }
        None => {
            // every failing stage pushes at least one error
            let error = GenericError::pipeline("Request failed without an error");
            tracing::error!(error_id = %error.id(), "error reply with empty error list");
            let envelope = ErrorEnvelope::from_errors(std::slice::from_ref(&error), flags);
            OutboundResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope.map(|e| e.to_value()).unwrap_or(Value::Null),
            )
        }
    }
}

/// Validates every input category of `request` against the route's merged
/// schemas. Categories without a schema pass through unchanged.
async fn validate_request(
    route: &BoundRoute,
    request: &InboundRequest,
) -> Result<RequestView, GenericError> {
    let input = route.input();
    let mut custom = CustomResults::new();

    let headers = if input.headers.is_empty() {
        Value::Object(
            request
                .headers
                .iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), Value::String(value.clone())))
                .collect::<Map<_, _>>(),
        )
    } else {
        input.headers.validate(&request.headers)?
    };

    let raw_cookies = request
        .raw_cookies()
        .map(Cookies::parse)
        .unwrap_or_default()
        .to_value();
    let cookies = validate_category(&input.cookies, raw_cookies, Category::Cookies, &mut custom).await?;
    let query = validate_category(&input.query, request.query.clone(), Category::Query, &mut custom).await?;
    let body = validate_category(&input.body, request.body.clone(), Category::Body, &mut custom).await?;

    Ok(RequestView {
        body,
        query,
        headers,
        cookies,
        params: request.params.clone(),
        custom,
    })
}

async fn validate_category(
    schema: &Schema,
    raw: Value,
    category: Category,
    custom: &mut CustomResults,
) -> Result<Value, GenericError> {
    if schema.is_empty() {
        return Ok(raw);
    }
    let validated: Validated = schema.validate(&raw).await?;
    for (contributor, results) in validated.custom() {
        let entry = custom.entry(contributor.clone()).or_default();
        for (path, value) in results {
            entry.insert(format!("{category}.{path}"), value.clone());
        }
    }
    Ok(validated.into_data())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::Binder;
    use http::Method;
    use parking_lot::Mutex;
    use serde_json::json;
    use tessera_core::ErrorKind;
    use tessera_middleware::FnMiddleware;
    use tessera_schema::{leaf, BoxFuture, InputSchemas, OutputSchemas};

    #[derive(Default)]
    struct Capture(Mutex<Vec<OutboundResponse>>);

    impl Reply for Capture {
        fn send(&self, response: OutboundResponse) -> BoxFuture<'_, Result<(), GenericError>> {
            self.0.lock().push(response);
            Box::pin(async { Ok(()) })
        }
    }

    fn request(body: Value) -> InboundRequest {
        InboundRequest {
            body,
            ..InboundRequest::new(Method::POST)
        }
    }

    #[tokio::test]
    async fn test_happy_path_states() {
        let route = Binder::new(Method::POST)
            .input(InputSchemas::new().body(Schema::new().field("n", leaf::integer())))
            .handler(|ctx| async move { Ok(CallbackOutput::new(json!({"n": ctx.body()["n"]}))) })
            .bind()
            .unwrap();

        let capture = Capture::default();
        let outcome = route.handle("/n", request(json!({"n": "4"})), &capture).await;

        assert_eq!(
            outcome.states,
            vec![
                PipelineState::Init,
                PipelineState::Validating,
                PipelineState::BeforeMiddlewareRunning,
                PipelineState::CallbackRunning,
                PipelineState::AfterMiddlewareRunning,
                PipelineState::SendSuccess,
            ]
        );
        assert!(outcome.is_success());
        assert!(outcome.flags.reply_sent);
        assert_eq!(outcome.response.body, json!({"n": 4}));
        assert_eq!(capture.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_skips_to_after() {
        let route = Binder::new(Method::POST)
            .input(InputSchemas::new().body(Schema::new().field("n", leaf::integer())))
            .handler(|_| async { Ok(CallbackOutput::default()) })
            .bind()
            .unwrap();

        let outcome = route
            .handle("/n", request(json!({"n": "x"})), &Capture::default())
            .await;

        assert_eq!(
            outcome.states,
            vec![
                PipelineState::Init,
                PipelineState::Validating,
                PipelineState::ValidateFailed,
                PipelineState::AfterMiddlewareRunning,
                PipelineState::SendError,
            ]
        );
        assert!(outcome.flags.validate_failed);
        assert_eq!(outcome.response.status, StatusCode::BAD_REQUEST);
        assert_eq!(outcome.response.body["flags"]["validate_failed"], true);
    }

    #[tokio::test]
    async fn test_callback_panic_is_contained() {
        let route = Binder::new(Method::GET)
            .handler(|_| async { panic!("callback exploded") })
            .bind()
            .unwrap();

        let outcome = route
            .handle("/boom", InboundRequest::new(Method::GET), &Capture::default())
            .await;

        assert!(outcome.flags.callback_errored);
        assert_eq!(outcome.terminal(), Some(PipelineState::SendError));
        assert_eq!(outcome.response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(outcome.errors[0].message().contains("callback exploded"));
    }

    #[tokio::test]
    async fn test_output_validation_failure() {
        let route = Binder::new(Method::GET)
            .output(OutputSchemas::new().body(Schema::new().field("id", leaf::uuid())))
            .handler(|_| async { Ok(CallbackOutput::new(json!({"id": "nope"}))) })
            .bind()
            .unwrap();

        let outcome = route
            .handle("/out", InboundRequest::new(Method::GET), &Capture::default())
            .await;

        assert!(outcome.flags.callback_errored);
        let error = &outcome.errors[0];
        assert_eq!(error.kind(), ErrorKind::Pipeline);
        assert_eq!(error.errors()[0].kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_invalid_callback_status() {
        let route = Binder::new(Method::GET)
            .handler(|_| async { Ok(CallbackOutput::default().status(1000)) })
            .bind()
            .unwrap();
        let outcome = route
            .handle("/s", InboundRequest::new(Method::GET), &Capture::default())
            .await;
        assert!(outcome.flags.callback_errored);
    }

    #[tokio::test]
    async fn test_custom_results_are_routed_by_category() {
        let seen = Arc::new(Mutex::new(None));
        let seen_mw = Arc::clone(&seen);
        let auth = FnMiddleware::new("auth")
            .input(InputSchemas::new().body(
                Schema::new().field("token", leaf::custom(|raw| Ok(json!({"user": raw})))),
            ))
            .before(move |ctx| {
                let seen = Arc::clone(&seen_mw);
                async move {
                    *seen.lock() = ctx.custom().cloned();
                    Ok(Value::Null)
                }
            })
            .shared();

        let route = Binder::new(Method::POST)
            .middleware(auth)
            .input(InputSchemas::new().body(
                Schema::new().field("token", leaf::custom(|raw| {
                    Ok(json!(format!("route:{}", raw.as_str().unwrap_or_default())))
                })),
            ))
            .handler(|ctx| async move {
                let custom = ctx.custom().cloned().unwrap_or_default();
                Ok(CallbackOutput::new(json!({
                    "route": custom.get("body.token").cloned(),
                    "body": ctx.body().clone(),
                })))
            })
            .bind()
            .unwrap();

        let outcome = route
            .handle("/t", request(json!({"token": "abc"})), &Capture::default())
            .await;

        assert!(outcome.is_success());
        let auth_results = seen.lock().clone().unwrap();
        assert_eq!(auth_results["body.token"], json!({"user": "abc"}));
        assert_eq!(outcome.response.body["route"], json!("route:abc"));
        assert_eq!(outcome.response.body["body"]["token"], json!("route:abc"));
    }
}
