//! End-to-end request handling through bound routes and the registry.

use http::{Method, StatusCode};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tessera_core::{ErrorKind, GenericError};
use tessera_middleware::{FnMiddleware, Trigger};
use tessera_pipeline::{Binder, BoundRoute, CallbackOutput, PipelineState, Registry};
use tessera_schema::{leaf, HeaderSchema, InputSchemas, Schema};
use tessera_test::{RecordingReply, TestRequest};

fn ok_route(method: Method) -> Binder {
    Binder::new(method).handler(|_| async { Ok(CallbackOutput::new(json!({"ok": true}))) })
}

#[tokio::test]
async fn test_failed_sibling_drops_success_cookie() {
    let after_ran = Arc::new(Mutex::new(false));
    let after_flag = Arc::clone(&after_ran);

    let route = Binder::new(Method::GET)
        .middleware(
            FnMiddleware::new("session")
                .before(|ctx| async move {
                    ctx.set_cookie("a", "1");
                    Ok(Value::Null)
                })
                .shared(),
        )
        .middleware(
            FnMiddleware::new("guard")
                .before(|_| async { Err(GenericError::middleware("guard rejected").into()) })
                .after(move |_| {
                    let flag = Arc::clone(&after_flag);
                    async move {
                        *flag.lock() = true;
                        Ok(Value::Null)
                    }
                })
                .shared(),
        )
        .handler(|_| async { panic!("callback must not run") })
        .bind()
        .unwrap();

    let reply = RecordingReply::new();
    let outcome = route
        .handle("/session", TestRequest::get().build().unwrap(), &reply)
        .await;

    assert!(*after_ran.lock());
    assert!(outcome.flags.before_middleware_errored);
    assert!(!outcome.flags.callback_errored);
    assert!(!outcome.states.contains(&PipelineState::CallbackRunning));
    assert_eq!(outcome.terminal(), Some(PipelineState::SendError));

    reply
        .assert_count(1)
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_no_cookie("a")
        .assert_json_field("type", "middleware")
        .assert_json_field("message", "guard rejected");
}

#[tokio::test]
async fn test_success_effects_and_precedence() {
    let route = Binder::new(Method::POST)
        .middleware(
            FnMiddleware::new("tracing")
                .before(|ctx| async move {
                    ctx.set_header_on(Trigger::OnBoth, "x-mode", "both");
                    ctx.set_header_on(Trigger::OnSuccess, "x-mode", "success");
                    ctx.set_header_on(Trigger::OnFailure, "x-retry", "later");
                    ctx.set_header("x-served-by", "tracing");
                    ctx.set_cookie("theme", "light");
                    ctx.set_cookie_on(Trigger::OnBoth, "visit", "1");
                    Ok(Value::Null)
                })
                .shared(),
        )
        .handler(|ctx| async move {
            ctx.set_cookie("theme", "dark");
            Ok(CallbackOutput::new(json!({"created": true}))
                .status(201)
                .header("X-Served-By", "route"))
        })
        .bind()
        .unwrap();

    let reply = RecordingReply::new();
    let outcome = route
        .handle("/things", TestRequest::post().build().unwrap(), &reply)
        .await;

    assert!(outcome.is_success());
    reply
        .assert_status(StatusCode::CREATED)
        .assert_header("x-mode", "success")
        .assert_header("x-served-by", "route")
        .assert_no_header("x-retry")
        .assert_cookie("theme")
        .assert_cookie("visit")
        .assert_json_field("created", true);

    let set_cookie = reply.last().unwrap().set_cookie.unwrap();
    assert!(set_cookie.contains("theme=dark"));
    assert!(!set_cookie.contains("theme=light"));
}

#[tokio::test]
async fn test_failure_effects_applied_to_error_reply() {
    let route = Binder::new(Method::GET)
        .middleware(
            FnMiddleware::new("limits")
                .before(|ctx| async move {
                    ctx.set_header_on(Trigger::OnFailure, "retry-after", "30");
                    ctx.set_header("x-quota", "10");
                    ctx.set_cookie_on(Trigger::OnFailure, "backoff", "1");
                    Ok(Value::Null)
                })
                .shared(),
        )
        .handler(|ctx| async move {
            ctx.set_cookie("cart", "full");
            Err(GenericError::invalid_input("No stock").into())
        })
        .bind()
        .unwrap();

    let reply = RecordingReply::new();
    let outcome = route
        .handle("/cart", TestRequest::get().build().unwrap(), &reply)
        .await;

    assert!(outcome.flags.callback_errored);
    reply
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_header("retry-after", "30")
        .assert_no_header("x-quota")
        .assert_cookie("backoff")
        .assert_no_cookie("cart")
        .assert_json_field("message", "No stock");
}

#[tokio::test]
async fn test_validation_failure_still_runs_after_middleware() {
    let seen_body = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&seen_body);

    let route = Binder::new(Method::POST)
        .middleware(
            FnMiddleware::new("audit")
                .after(move |ctx| {
                    let seen = Arc::clone(&seen);
                    async move {
                        *seen.lock() = Some((ctx.body().clone(), ctx.param("id").map(str::to_string)));
                        Ok(Value::Null)
                    }
                })
                .shared(),
        )
        .input(
            InputSchemas::new()
                .headers(HeaderSchema::new().required("x-tenant"))
                .body(Schema::new().field("age", leaf::integer())),
        )
        .handler(|_| async { Ok(CallbackOutput::default()) })
        .bind()
        .unwrap();

    let reply = RecordingReply::new();
    let request = TestRequest::post()
        .json(&json!({"age": 3}))
        .param("id", "u-1")
        .build()
        .unwrap();
    let outcome = route.handle("/users/:id", request, &reply).await;

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
    let (body, param) = seen_body.lock().clone().unwrap();
    assert_eq!(body, Value::Null);
    assert_eq!(param.as_deref(), Some("u-1"));

    reply
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_json_field("type", "missing_field");
    let body = reply.last().unwrap().body;
    assert_eq!(body["flags"]["validate_failed"], true);
    assert_eq!(body["flags"]["reply_sent"], false);
}

#[tokio::test]
async fn test_before_middleware_data_reaches_callback() {
    let route = Binder::new(Method::GET)
        .middleware(
            FnMiddleware::new("auth")
                .input(InputSchemas::new().headers(HeaderSchema::new().required("authorization")))
                .before(|ctx| async move {
                    let token = ctx.header("authorization").unwrap_or_default().to_string();
                    Ok(json!({"token": token}))
                })
                .shared(),
        )
        .handler(|ctx| async move {
            let auth = ctx.middleware_data("auth").cloned().unwrap_or_default();
            Ok(CallbackOutput::new(json!({"auth": auth})))
        })
        .bind()
        .unwrap();

    let reply = RecordingReply::new();
    let request = TestRequest::get().bearer_token("t0k").build().unwrap();
    let outcome = route.handle("/me", request, &reply).await;

    assert!(outcome.is_success());
    reply.assert_json_field("auth", json!({"token": "Bearer t0k"}));
}

#[tokio::test]
async fn test_query_and_cookies_are_validated() {
    let route = Binder::new(Method::GET)
        .input(
            InputSchemas::new()
                .query(Schema::new().field("page", leaf::integer()))
                .cookies(Schema::new().field("sid", leaf::string())),
        )
        .handler(|ctx| async move {
            Ok(CallbackOutput::new(json!({
                "page": ctx.query()["page"],
                "sid": ctx.cookies()["sid"],
            })))
        })
        .bind()
        .unwrap();

    let reply = RecordingReply::new();
    let request = TestRequest::get()
        .query("page", "2")
        .cookie("sid", "abc")
        .build()
        .unwrap();
    route.handle("/list", request, &reply).await;

    reply
        .assert_status(StatusCode::OK)
        .assert_json_field("page", 2)
        .assert_json_field("sid", "abc");
}

#[tokio::test]
async fn test_registry_not_found_and_method_not_allowed() {
    let mut registry = Registry::new();
    registry.bind("/users", ok_route(Method::GET)).unwrap();
    registry.bind("/users", ok_route(Method::POST)).unwrap();

    let missing = RecordingReply::new();
    let outcome = registry
        .dispatch("/nope", TestRequest::get().build().unwrap(), &missing)
        .await;
    assert_eq!(outcome.states, vec![PipelineState::Init, PipelineState::SendError]);
    assert_eq!(outcome.errors[0].kind(), ErrorKind::NoHandler);
    missing
        .assert_status(StatusCode::NOT_FOUND)
        .assert_json_field("type", "no_handler");

    let wrong_method = RecordingReply::new();
    let outcome = registry
        .dispatch("/users", TestRequest::delete().build().unwrap(), &wrong_method)
        .await;
    assert_eq!(outcome.errors[0].kind(), ErrorKind::MethodNotAvailable);
    wrong_method
        .assert_status(StatusCode::METHOD_NOT_ALLOWED)
        .assert_header("allow", "GET, POST");

    let found = RecordingReply::new();
    let outcome = registry
        .dispatch("/users", TestRequest::post().build().unwrap(), &found)
        .await;
    assert!(outcome.is_success());
    found.assert_status(StatusCode::OK).assert_json_field("ok", true);
}

#[tokio::test]
async fn test_failed_delivery_is_not_retried() {
    let route: BoundRoute = ok_route(Method::GET).bind().unwrap();
    let reply = RecordingReply::failing("connection reset");

    let outcome = route
        .handle("/flaky", TestRequest::get().build().unwrap(), &reply)
        .await;

    assert!(outcome.is_success());
    assert!(outcome.flags.reply_sent);
    let delivery = outcome.delivery_error.unwrap();
    assert_eq!(delivery.message(), "connection reset");
    reply.assert_count(1);
}

#[tokio::test]
async fn test_after_middleware_failure_turns_success_into_error() {
    let route = Binder::new(Method::GET)
        .middleware(
            FnMiddleware::new("reporter")
                .after(|ctx| async move {
                    assert_eq!(ctx.response(), Some(&json!({"ok": true})));
                    Err("report sink unavailable".into())
                })
                .shared(),
        )
        .handler(|_| async { Ok(CallbackOutput::new(json!({"ok": true}))) })
        .bind()
        .unwrap();

    let reply = RecordingReply::new();
    let outcome = route
        .handle("/report", TestRequest::get().build().unwrap(), &reply)
        .await;

    assert!(outcome.flags.after_middleware_errored);
    assert_eq!(
        &outcome.states[outcome.states.len() - 3..],
        &[
            PipelineState::AfterMiddlewareRunning,
            PipelineState::AfterMiddlewareFailed,
            PipelineState::SendError,
        ]
    );
    reply.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_header_overrides_regardless_of_case() {
    let route = Binder::new(Method::GET)
        .middleware(
            FnMiddleware::new("stamp")
                .before(|ctx| async move {
                    ctx.set_header("X-Version", "middleware");
                    Ok(Value::Null)
                })
                .shared(),
        )
        .handler(|_| async {
            let mut output = CallbackOutput::new(json!({}));
            output
                .headers
                .insert("X-Version".to_string(), "route".to_string());
            Ok(output)
        })
        .bind()
        .unwrap();

    let reply = RecordingReply::new();
    route
        .handle("/version", TestRequest::get().build().unwrap(), &reply)
        .await;

    let response = reply.single().unwrap();
    let versions: Vec<&str> = response
        .headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("x-version"))
        .map(|(_, value)| value.as_str())
        .collect();
    assert_eq!(versions, vec!["route"]);
    reply.assert_header("x-version", "route");
}

#[tokio::test]
async fn test_cookie_with_separator_in_value_is_not_sent() {
    let route = Binder::new(Method::GET)
        .handler(|ctx| async move {
            ctx.set_cookie("sid", "x; Domain=evil.com");
            ctx.set_cookie("theme", "dark");
            Ok(CallbackOutput::new(json!({})))
        })
        .bind()
        .unwrap();

    let reply = RecordingReply::new();
    let outcome = route
        .handle("/login", TestRequest::get().build().unwrap(), &reply)
        .await;

    assert!(outcome.is_success());
    reply.assert_cookie("theme").assert_no_cookie("sid");
    let set_cookie = reply.last().unwrap().set_cookie.unwrap();
    assert!(!set_cookie.contains("evil.com"));
}
