//! # Tessera Test
//!
//! Testing utilities for Tessera routes.
//!
//! Drives a bound route or a registry entirely in memory: [`TestRequest`]
//! builds the decoded request a transport would hand over, and
//! [`RecordingReply`] captures the single reply the pipeline sends.
//!
//! ## Example
//!
//! ```
//! use http::{Method, StatusCode};
//! use serde_json::json;
//! use tessera_pipeline::{Binder, CallbackOutput};
//! use tessera_test::{RecordingReply, TestRequest};
//!
//! # tokio_test::block_on(async {
//! let route = Binder::new(Method::GET)
//!     .handler(|ctx| async move {
//!         Ok(CallbackOutput::new(json!({ "id": ctx.param("id") })))
//!     })
//!     .bind()
//!     .unwrap();
//!
//! let reply = RecordingReply::new();
//! let request = TestRequest::get().param("id", "42").build().unwrap();
//! route.handle("/users/:id", request, &reply).await;
//!
//! reply
//!     .assert_status(StatusCode::OK)
//!     .assert_json_field("id", "42");
//! # });
//! ```

mod error;
mod reply;
mod request;

pub use error::TestError;
pub use reply::RecordingReply;
pub use request::{TestRequest, TestRequestBuilder};
