//! Inbound and outbound message shapes.
//!
//! The transport hands the pipeline an [`InboundRequest`] with the body and
//! query already decoded to JSON, and receives exactly one
//! [`OutboundResponse`] back through a [`Reply`](crate::Reply) handle.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use http::{Method, StatusCode};
use http_body_util::Full;
use indexmap::IndexMap;
use serde_json::Value;
use tessera_core::GenericError;

/// A request as decoded by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Decoded JSON body (`null` when absent).
    pub body: Value,
    /// Decoded query parameters.
    pub query: Value,
    /// Request headers.
    pub headers: IndexMap<String, String>,
    /// Raw `Cookie` header value.
    pub cookie_header: Option<String>,
    /// Route parameters.
    pub params: IndexMap<String, String>,
}

impl InboundRequest {
    /// Creates an empty request for `method`.
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: Value::Null,
            query: Value::Object(serde_json::Map::new()),
            headers: IndexMap::new(),
            cookie_header: None,
            params: IndexMap::new(),
        }
    }

    /// Returns a header value, matching the name case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the raw cookie header, falling back to a `cookie` entry in
    /// the header map.
    #[must_use]
    pub fn raw_cookies(&self) -> Option<&str> {
        self.cookie_header
            .as_deref()
            .or_else(|| self.header("cookie"))
    }
}

/// The single terminal reply of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundResponse {
    /// Status code.
    pub status: StatusCode,
    /// Headers by lowercased name.
    pub headers: IndexMap<String, String>,
    /// Every outbound cookie, joined by `"; "`.
    pub set_cookie: Option<String>,
    /// JSON body.
    pub body: Value,
}

impl OutboundResponse {
    /// Creates a response with no headers or cookies.
    #[must_use]
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: IndexMap::new(),
            set_cookie: None,
            body,
        }
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Converts into an `http` response with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns a pipeline error if a header name or value is not valid HTTP.
    pub fn into_http(self) -> Result<http::Response<Full<Bytes>>, GenericError> {
        let invalid = |what: &str, detail: String| {
            GenericError::pipeline(format!("invalid response {what}: {detail}"))
        };

        let body = serde_json::to_vec(&self.body).map_err(|e| invalid("body", e.to_string()))?;
        let mut response = http::Response::builder()
            .status(self.status)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| invalid("status", e.to_string()))?;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid("header name", format!("{name}: {e}")))?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|e| invalid("header value", format!("{name}: {e}")))?;
            headers.insert(header_name, header_value);
        }
        if let Some(cookies) = self.set_cookie {
            let value = HeaderValue::from_str(&cookies)
                .map_err(|e| invalid("set-cookie", e.to_string()))?;
            headers.insert(SET_COOKIE, value);
        }

        Ok(response)
    }
}

impl TryFrom<OutboundResponse> for http::Response<Full<Bytes>> {
    type Error = GenericError;

    fn try_from(response: OutboundResponse) -> Result<Self, Self::Error> {
        response.into_http()
    }
}
