//! # Tessera Pipeline
//!
//! Binds validation, middleware and a callback to an HTTP method and serves
//! requests through a per-request state machine.
//!
//! ## Overview
//!
//! ```text
//! Binder ──bind()──► BoundRoute ──handle()──► RequestPipeline ──► Reply (once)
//!                        ▲
//! Registry ──dispatch()──┘   (404 / 405 answered directly)
//! ```
//!
//! - [`Binder`] - Collects middleware, schema fragments and the callback
//! - [`BoundRoute`] - Immutable route with schemas composed at bind time
//! - [`RequestPipeline`] - Validate, before, callback, after, reply
//! - [`Reply`] / [`ReplyGuard`] - Transport handle and its exactly-once guard
//! - [`Registry`] - Explicit route table
//!
//! ## Example
//!
//! ```
//! use http::Method;
//! use serde_json::json;
//! use tessera_pipeline::{Binder, CallbackOutput, InboundRequest, Registry, Route};
//! # use tessera_pipeline::{OutboundResponse, Reply};
//! # use tessera_core::GenericError;
//! # use tessera_schema::BoxFuture;
//! # struct Discard;
//! # impl Reply for Discard {
//! #     fn send(&self, _: OutboundResponse) -> BoxFuture<'_, Result<(), GenericError>> {
//! #         Box::pin(async { Ok(()) })
//! #     }
//! # }
//!
//! # tokio_test::block_on(async {
//! let registry = Registry::new().route(
//!     "/ping",
//!     Route::new()
//!         .bind(Binder::new(Method::GET).handler(|_| async {
//!             Ok(CallbackOutput::new(json!({ "pong": true })))
//!         }))
//!         .unwrap(),
//! );
//!
//! let outcome = registry
//!     .dispatch("/ping", InboundRequest::new(Method::GET), &Discard)
//!     .await;
//! assert!(outcome.is_success());
//! assert_eq!(outcome.response.body, json!({ "pong": true }));
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/tessera-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod binder;
mod callback;
mod pipeline;
mod registry;
mod reply;
mod request;
mod state;

pub use binder::{Binder, BoundRoute};
pub use callback::{
    callback, CallbackContext, CallbackFuture, CallbackOutput, SharedCallback, ROUTE_CONTRIBUTOR,
};
pub use pipeline::{PipelineOutcome, RequestPipeline};
pub use registry::{Registry, Route};
pub use reply::{ErrorEnvelope, Reply, ReplyGuard};
pub use request::{InboundRequest, OutboundResponse};
pub use state::{PipelineFlags, PipelineState};
