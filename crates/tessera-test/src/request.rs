//! Test request building.

use crate::error::TestError;
use http::{header, Method};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tessera_pipeline::InboundRequest;

/// Entry points for building an [`InboundRequest`].
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tessera_test::TestRequest;
///
/// let request = TestRequest::post()
///     .json(&json!({ "name": "Ada" }))
///     .header("X-Request-Id", "r-1")
///     .cookie("sid", "abc")
///     .query("page", "2")
///     .param("id", "7")
///     .build()
///     .unwrap();
///
/// assert_eq!(request.body["name"], "Ada");
/// assert_eq!(request.header("x-request-id"), Some("r-1"));
/// assert_eq!(request.raw_cookies(), Some("sid=abc"));
/// assert_eq!(request.query["page"], "2");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TestRequest;

impl TestRequest {
    /// Creates a new GET request.
    pub fn get() -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET)
    }

    /// Creates a new POST request.
    pub fn post() -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST)
    }

    /// Creates a new PUT request.
    pub fn put() -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT)
    }

    /// Creates a new PATCH request.
    pub fn patch() -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH)
    }

    /// Creates a new DELETE request.
    pub fn delete() -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE)
    }
}

/// Builder for [`InboundRequest`]s.
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    headers: IndexMap<String, String>,
    cookies: Vec<(String, String)>,
    query: Map<String, Value>,
    params: IndexMap<String, String>,
    body: Result<Value, String>,
}

impl TestRequestBuilder {
    /// Creates a new request builder.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: IndexMap::new(),
            cookies: Vec::new(),
            query: Map::new(),
            params: IndexMap::new(),
            body: Ok(Value::Null),
        }
    }

    /// Sets a header. A later call with the same name wins.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.headers.insert(
            name.as_ref().to_ascii_lowercase(),
            value.as_ref().to_string(),
        );
        self
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header(
            header::AUTHORIZATION.as_str(),
            format!("Bearer {}", token.as_ref()),
        )
    }

    /// Adds a cookie to the raw `Cookie` header.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Adds a query parameter. Values are strings, as a transport decodes them.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), Value::String(value.into()));
        self
    }

    /// Adds a route parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Sets the decoded body directly.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Ok(body);
        self
    }

    /// Sets the body from any serializable value.
    ///
    /// This also sets the `Content-Type` header to `application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        self.body = serde_json::to_value(value).map_err(|e| e.to_string());
        self.header(header::CONTENT_TYPE.as_str(), "application/json")
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::RequestBuild`] if the body failed to serialize
    /// or a cookie name is empty.
    pub fn build(self) -> Result<InboundRequest, TestError> {
        let body = self
            .body
            .map_err(|e| TestError::RequestBuild(format!("Invalid JSON body: {e}")))?;

        if self.cookies.iter().any(|(name, _)| name.is_empty()) {
            return Err(TestError::RequestBuild("empty cookie name".to_string()));
        }
        let cookie_header = (!self.cookies.is_empty()).then(|| {
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ")
        });

        Ok(InboundRequest {
            body,
            query: Value::Object(self.query),
            headers: self.headers,
            cookie_header,
            params: self.params,
            ..InboundRequest::new(self.method)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let request = TestRequest::get().build().unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.body, Value::Null);
        assert_eq!(request.query, json!({}));
        assert!(request.cookie_header.is_none());
    }

    #[test]
    fn test_header_last_write_wins() {
        let request = TestRequest::get()
            .header("X-Mode", "a")
            .header("x-mode", "b")
            .build()
            .unwrap();
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("X-MODE"), Some("b"));
    }

    #[test]
    fn test_cookies_joined() {
        let request = TestRequest::get()
            .cookie("a", "1")
            .cookie("b", "2")
            .build()
            .unwrap();
        assert_eq!(request.raw_cookies(), Some("a=1; b=2"));
    }

    #[test]
    fn test_bearer_token() {
        let request = TestRequest::get().bearer_token("t0k").build().unwrap();
        assert_eq!(request.header("authorization"), Some("Bearer t0k"));
    }

    #[test]
    fn test_empty_cookie_name_rejected() {
        let result = TestRequest::get().cookie("", "x").build();
        assert!(matches!(result, Err(TestError::RequestBuild(_))));
    }

    #[test]
    fn test_params() {
        let request = TestRequest::delete().param("id", "9").build().unwrap();
        assert_eq!(request.params["id"], "9");
    }
}
