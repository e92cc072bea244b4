//! # Tessera Schema
//!
//! Declarative validation for request and response data.
//!
//! - [`unit`] - Single-shot validation units and the [`Validator`] trait
//! - [`leaf`] - Standard leaves (string, number, boolean, uuid, enum,
//!   optional, array, custom)
//! - [`Schema`] - Nested trees of leaves, validated in one walk
//! - [`merge_fragments`] - Composition of fragments from several contributors
//! - [`HeaderSchema`] - Flat, case-insensitive header requirements
//! - [`compose_input`] - One merged schema per category for a bound route
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use tessera_schema::{leaf, Schema};
//!
//! # tokio_test::block_on(async {
//! let schema = Schema::new()
//!     .field("id", leaf::uuid())
//!     .field("tags", leaf::array(leaf::string()));
//!
//! let error = schema.validate(&json!({ "tags": [] })).await.unwrap_err();
//! assert_eq!(error.data()["path"], "id");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/tessera-schema/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod compose;
mod contract;
mod header;
pub mod leaf;
mod schema;
pub mod unit;

pub use compose::{merge_flat_fragments, merge_fragments, Fragment};
pub use contract::{
    compose_input, compose_output, Category, ComposedInput, ComposedOutput, InputSchemas,
    OutputSchemas,
};
pub use header::{merge_header_schemas, HeaderSchema};
pub use schema::{CustomEntry, CustomResults, Node, Schema, Tree, Validated};
pub use unit::{
    resolved, BoxFuture, HandlerFuture, SharedValidator, TraceEntry, TypeTag, UnitHandle,
    UnitResult, ValidationUnit, Validator,
};
