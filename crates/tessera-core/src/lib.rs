//! # Tessera Core
//!
//! Core types for the Tessera request-binding framework.
//!
//! - [`GenericError`] - Serializable error tree used by every stage
//! - [`ErrorKind`] - Closed fault taxonomy with default HTTP status codes
//! - [`Thrown`] - Uncanonicalized failure values accepted by [`GenericError::from_unknown`]
//! - [`settle`] - One-shot settle cell used by validation units
//! - [`debug`] - Process-wide debug flag

#![doc(html_root_url = "https://docs.rs/tessera-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod debug;
mod error;
pub mod settle;

pub use debug::{debug_enabled, set_debug};
pub use error::{
    ErrorKind, GenericError, SerializedError, TesseraResult, Thrown, UNKNOWN_ERROR_MESSAGE,
};
pub use settle::{once_settle, OnceSettle, Settlement};
