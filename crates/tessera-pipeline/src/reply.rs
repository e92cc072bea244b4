//! Reply handles and the error envelope.

use crate::request::OutboundResponse;
use crate::state::PipelineFlags;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use tessera_core::{GenericError, SerializedError, Thrown};
use tessera_schema::BoxFuture;

/// Transport handle that delivers the terminal reply.
///
/// The pipeline calls [`send`](Self::send) at most once per request.
pub trait Reply: Send + Sync {
    /// Delivers `response` to the client.
    fn send(&self, response: OutboundResponse) -> BoxFuture<'_, Result<(), GenericError>>;
}

/// Exactly-once wrapper around a [`Reply`].
///
/// The first [`send`](Self::send) is delivered; any later attempt is refused
/// and logged. A failing or panicking transport is logged and never retried.
pub struct ReplyGuard<'a> {
    reply: &'a dyn Reply,
    route: &'a str,
    sent: bool,
}

impl std::fmt::Debug for ReplyGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyGuard")
            .field("route", &self.route)
            .field("sent", &self.sent)
            .finish_non_exhaustive()
    }
}

impl<'a> ReplyGuard<'a> {
    /// Wraps `reply` for the request labelled `route`.
    #[must_use]
    pub fn new(reply: &'a dyn Reply, route: &'a str) -> Self {
        Self {
            reply,
            route,
            sent: false,
        }
    }

    /// Returns `true` once a send was attempted.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Sends `response` unless a reply was already attempted.
    ///
    /// # Errors
    ///
    /// Returns a pipeline error when a reply was already attempted, or the
    /// canonicalized transport failure. Both are logged here.
    pub async fn send(&mut self, response: OutboundResponse) -> Result<(), GenericError> {
        if self.sent {
            let error = GenericError::pipeline("Reply already sent")
                .with_hint("a request produces exactly one terminal reply");
            tracing::error!(
                route = %self.route,
                status = response.status.as_u16(),
                error_id = %error.id(),
                "second reply attempt discarded"
            );
            return Err(error);
        }
        self.sent = true;

        let status = response.status.as_u16();
        let started = std::panic::catch_unwind(AssertUnwindSafe(|| self.reply.send(response)));
        let result = match started {
            Ok(future) => match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result.map_err(Thrown::from),
                Err(payload) => Err(Thrown::from_panic(payload)),
            },
            Err(payload) => Err(Thrown::from_panic(payload)),
        };

        result.map_err(|thrown| {
            let error = GenericError::from_unknown(
                thrown,
                Some(GenericError::pipeline("Reply transport failed")),
                Some("the reply is not retried"),
            );
            tracing::error!(
                route = %self.route,
                status,
                error_id = %error.id(),
                error = %error,
                "reply failed"
            );
            error
        })
    }
}

/// Body of an error reply.
///
/// The most recent error is serialized at the top level; every earlier error
/// of the request is attached to its `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The serialized error tree.
    #[serde(flatten)]
    pub error: SerializedError,
    /// Pipeline flags at the time of the reply.
    pub flags: PipelineFlags,
}

impl ErrorEnvelope {
    /// Builds an envelope from the request's error list, oldest first.
    ///
    /// Returns `None` if `errors` is empty.
    #[must_use]
    pub fn from_errors(errors: &[GenericError], flags: PipelineFlags) -> Option<Self> {
        let (last, earlier) = errors.split_last()?;
        let mut head = last.clone();
        for error in earlier {
            head.add_error(error.clone());
        }
        Some(Self {
            error: head.serialize(),
            flags,
        })
    }

    /// Returns the envelope as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|error| {
            tracing::error!(error = %error, "failed to serialize error envelope");
            Value::Null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use parking_lot::Mutex;
    use tessera_core::ErrorKind;

    #[derive(Default)]
    struct Capture {
        sent: Mutex<Vec<OutboundResponse>>,
        fail: bool,
        panic: bool,
    }

    impl Reply for Capture {
        fn send(&self, response: OutboundResponse) -> BoxFuture<'_, Result<(), GenericError>> {
            Box::pin(async move {
                if self.panic {
                    panic!("socket closed");
                }
                self.sent.lock().push(response);
                if self.fail {
                    Err(GenericError::internal("connection reset"))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn test_guard_sends_once() {
        let capture = Capture::default();
        let mut guard = ReplyGuard::new(&capture, "/users");
        assert!(!guard.is_sent());

        guard
            .send(OutboundResponse::new(StatusCode::OK, Value::Null))
            .await
            .unwrap();
        assert!(guard.is_sent());

        let second = guard
            .send(OutboundResponse::new(StatusCode::INTERNAL_SERVER_ERROR, Value::Null))
            .await
            .unwrap_err();
        assert_eq!(second.kind(), ErrorKind::Pipeline);

        let sent = capture.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_guard_does_not_retry_failures() {
        let capture = Capture {
            fail: true,
            ..Capture::default()
        };
        let mut guard = ReplyGuard::new(&capture, "/users");
        let error = guard
            .send(OutboundResponse::new(StatusCode::OK, Value::Null))
            .await
            .unwrap_err();
        assert_eq!(error.message(), "connection reset");
        assert_eq!(capture.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_guard_contains_transport_panic() {
        let capture = Capture {
            panic: true,
            ..Capture::default()
        };
        let mut guard = ReplyGuard::new(&capture, "/users");
        let error = guard
            .send(OutboundResponse::new(StatusCode::OK, Value::Null))
            .await
            .unwrap_err();
        assert!(error.message().contains("socket closed"));
        assert!(guard.is_sent());
    }

    #[test]
    fn test_envelope_nests_earlier_errors() {
        let first = GenericError::invalid_input("Invalid number");
        let second = GenericError::middleware("after failed");
        let envelope = ErrorEnvelope::from_errors(
            &[first.clone(), second.clone()],
            PipelineFlags {
                validate_failed: true,
                after_middleware_errored: true,
                ..PipelineFlags::default()
            },
        )
        .unwrap();

        let value = envelope.to_value();
        assert_eq!(value["id"], second.id().to_string());
        assert_eq!(value["type"], "middleware");
        assert_eq!(value["errors"][0]["id"], first.id().to_string());
        assert_eq!(value["flags"]["validate_failed"], true);
        assert_eq!(value["flags"]["after_middleware_errored"], true);
    }

    #[test]
    fn test_envelope_round_trips() {
        let envelope =
            ErrorEnvelope::from_errors(&[GenericError::no_handler("/x")], PipelineFlags::default())
                .unwrap();
        let back: ErrorEnvelope = serde_json::from_value(envelope.to_value()).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_empty_errors() {
        assert!(ErrorEnvelope::from_errors(&[], PipelineFlags::default()).is_none());
    }
}
