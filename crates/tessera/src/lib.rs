//! # Tessera
//!
//! **Schema-validated request pipelines with composable middleware**
//!
//! Tessera binds route callbacks to a fixed request lifecycle:
//!
//! - **Declarative validation** – body, query, header and cookie schemas built
//!   from concurrent validation units
//! - **Schema composition** – middleware contribute schema fragments that are
//!   merged with the route's own when the route is bound
//! - **Concurrent middleware** – before and after stages run siblings
//!   concurrently and collect headers and cookies per outcome
//! - **Exactly one reply** – every request ends in a single success or error
//!   reply, with failures canonicalized into a typed error tree
//!
//! ## Quick Start
//!
//! ```
//! use http::Method;
//! use serde_json::json;
//! use tessera::prelude::*;
//!
//! let auth = FnMiddleware::new("auth")
//!     .input(InputSchemas::new().headers(HeaderSchema::new().required("authorization")))
//!     .before(|ctx| async move { Ok(json!({ "user": ctx.header("authorization") })) })
//!     .shared();
//!
//! let mut registry = Registry::new();
//! registry
//!     .bind(
//!         "/users/:id",
//!         Binder::new(Method::GET)
//!             .middleware(auth)
//!             .input(InputSchemas::new().query(Schema::new().field("page", leaf::integer())))
//!             .handler(|ctx| async move {
//!                 Ok(CallbackOutput::new(json!({ "id": ctx.param("id") })))
//!             }),
//!     )
//!     .unwrap();
//!
//! assert_eq!(registry.len(), 1);
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! Init → Validating → BeforeMiddleware → Callback → AfterMiddleware → Send
//!            ↓                ↓              ↓              ↑
//!            └────────────────┴──────────────┴──────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/tessera/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use tessera_core as core;

// Re-export schema types
pub use tessera_schema as schema;

// Re-export middleware types
pub use tessera_middleware as middleware;

// Re-export pipeline types
pub use tessera_pipeline as pipeline;

// Re-export configuration
pub use tessera_config as config;

// Re-export telemetry
pub use tessera_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use tessera::prelude::*;
///
/// let error = GenericError::no_handler("/missing");
/// assert_eq!(error.kind(), ErrorKind::NoHandler);
/// ```
pub mod prelude {
    pub use tessera_core::{ErrorKind, GenericError, TesseraResult, Thrown};

    // Schemas and validation units
    pub use tessera_schema::{leaf, HeaderSchema, InputSchemas, OutputSchemas, Schema, Validated};

    // Middleware
    pub use tessera_middleware::{
        Cookie, CookieOptions, FnMiddleware, Middleware, MiddlewareContext, SameSite, Stage,
        Trigger,
    };

    // Pipeline
    pub use tessera_pipeline::{
        Binder, BoundRoute, CallbackContext, CallbackOutput, InboundRequest, OutboundResponse,
        PipelineOutcome, Registry, Reply, Route,
    };

    // Configuration and logging
    pub use tessera_config::{ConfigLoader, TesseraConfig};
    pub use tessera_telemetry::{init_logging, LogConfig};
}
