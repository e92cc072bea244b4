//! Recording reply handle.

use crate::error::TestError;
use http::StatusCode;
use parking_lot::Mutex;
use tessera_core::GenericError;
use tessera_pipeline::{OutboundResponse, Reply};
use tessera_schema::BoxFuture;

/// A [`Reply`] that records every response it is handed.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use serde_json::json;
/// use tessera_pipeline::{OutboundResponse, Reply};
/// use tessera_test::RecordingReply;
///
/// # tokio_test::block_on(async {
/// let reply = RecordingReply::new();
/// reply
///     .send(OutboundResponse::new(StatusCode::OK, json!({"ok": true})))
///     .await
///     .unwrap();
///
/// reply
///     .assert_count(1)
///     .assert_status(StatusCode::OK)
///     .assert_json_field("ok", true);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct RecordingReply {
    sent: Mutex<Vec<OutboundResponse>>,
    failure: Option<String>,
}

impl RecordingReply {
    /// Creates a reply that accepts every send.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reply that records the send and then reports a transport
    /// failure with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: Mutex::default(),
            failure: Some(message.into()),
        }
    }

    /// Returns every recorded response, oldest first.
    pub fn sent(&self) -> Vec<OutboundResponse> {
        self.sent.lock().clone()
    }

    /// Returns how many sends were attempted.
    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Returns the most recent response.
    pub fn last(&self) -> Option<OutboundResponse> {
        self.sent.lock().last().cloned()
    }

    /// Returns the only response.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::ReplyCount`] unless exactly one send was made.
    pub fn single(&self) -> Result<OutboundResponse, TestError> {
        let sent = self.sent.lock();
        match sent.as_slice() {
            [only] => Ok(only.clone()),
            other => Err(TestError::ReplyCount(other.len())),
        }
    }

    fn expect_single(&self) -> OutboundResponse {
        match self.single() {
            Ok(response) => response,
            Err(error) => panic!("{error}"),
        }
    }

    /// Asserts the number of sends.
    ///
    /// # Panics
    ///
    /// Panics if the count differs.
    #[track_caller]
    pub fn assert_count(&self, expected: usize) -> &Self {
        let actual = self.count();
        assert_eq!(
            actual, expected,
            "Expected {expected} replies, got {actual}"
        );
        self
    }

    /// Asserts the status of the only response.
    ///
    /// # Panics
    ///
    /// Panics if there is not exactly one response or the status differs.
    #[track_caller]
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        let actual = self.expect_single().status;
        assert_eq!(
            actual, expected,
            "Expected status {expected}, got {actual}"
        );
        self
    }

    /// Asserts a header of the only response.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or has a different value.
    #[track_caller]
    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let response = self.expect_single();
        match response.header(name) {
            Some(actual) => assert_eq!(
                actual, expected,
                "Header '{name}' expected '{expected}', got '{actual}'"
            ),
            None => panic!("Header '{name}' not found"),
        }
        self
    }

    /// Asserts the only response does not carry header `name`.
    ///
    /// # Panics
    ///
    /// Panics if the header is present.
    #[track_caller]
    pub fn assert_no_header(&self, name: &str) -> &Self {
        let response = self.expect_single();
        assert!(
            response.header(name).is_none(),
            "Header '{name}' should not be present"
        );
        self
    }

    /// Asserts the only response sets cookie `name`.
    ///
    /// # Panics
    ///
    /// Panics if no cookie with that name is set.
    #[track_caller]
    pub fn assert_cookie(&self, name: &str) -> &Self {
        assert!(
            has_cookie(&self.expect_single(), name),
            "Cookie '{name}' not set"
        );
        self
    }

    /// Asserts the only response does not set cookie `name`.
    ///
    /// # Panics
    ///
    /// Panics if a cookie with that name is set.
    #[track_caller]
    pub fn assert_no_cookie(&self, name: &str) -> &Self {
        assert!(
            !has_cookie(&self.expect_single(), name),
            "Cookie '{name}' should not be set"
        );
        self
    }

    /// Asserts a top-level field of the only response's JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the field is missing or has a different value.
    #[track_caller]
    pub fn assert_json_field(&self, field: &str, expected: impl Into<serde_json::Value>) -> &Self {
        let body = self.expect_single().body;
        let expected = expected.into();
        match body.get(field) {
            Some(actual) => assert_eq!(
                actual, &expected,
                "Field '{field}' expected {expected}, got {actual}"
            ),
            None => panic!("Field '{field}' not found in {body}"),
        }
        self
    }
}

const ATTRIBUTES: [&str; 5] = ["path", "domain", "max-age", "expires", "samesite"];

/// Returns true if `response` sets a cookie called `name`.
fn has_cookie(response: &OutboundResponse, name: &str) -> bool {
    let Some(header) = response.set_cookie.as_deref() else {
        return false;
    };
    header
        .split("; ")
        .filter_map(|part| part.split_once('='))
        .filter(|(key, _)| !ATTRIBUTES.contains(&key.to_ascii_lowercase().as_str()))
        .any(|(key, _)| key == name)
}

impl Reply for RecordingReply {
    fn send(&self, response: OutboundResponse) -> BoxFuture<'_, Result<(), GenericError>> {
        Box::pin(async move {
            self.sent.lock().push(response);
            match &self.failure {
                Some(message) => Err(GenericError::internal(message.clone())),
                None => Ok(()),
            }
        })
    }
}
