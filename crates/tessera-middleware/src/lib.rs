//! # Tessera Middleware
//!
//! Before/after middleware for bound routes.
//!
//! ## Overview
//!
//! Middleware run in two stages around the route callback:
//!
//! ```text
//! validate ─► before (concurrent) ─► callback ─► after (concurrent, always) ─► reply
//! ```
//!
//! Within a stage every middleware runs concurrently and is awaited to
//! completion. Headers and cookies are filed under a [`Trigger`] and applied
//! once the terminal outcome is known.
//!
//! ## Modules
//!
//! - [`middleware`] - The [`Middleware`] trait and closure-based [`FnMiddleware`]
//! - [`context`] - The request-facing [`MiddlewareContext`]
//! - [`effects`] - Trigger-scoped header and cookie accumulation
//! - [`cookie`] - Cookie parsing and `Set-Cookie` rendering
//! - [`runner`] - Concurrent stage execution

#![doc(html_root_url = "https://docs.rs/tessera-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod cookie;
pub mod effects;
pub mod middleware;
pub mod runner;

pub use context::{MiddlewareContext, RequestView};
pub use cookie::{render_set_cookie, Cookie, CookieOptions, Cookies, InvalidCookie, SameSite};
pub use effects::{Effects, ResolvedEffects, Trigger, TriggerMap};
pub use middleware::{FnMiddleware, Middleware, MiddlewareFuture, SharedMiddleware, Stage};
pub use runner::{MiddlewareOutcome, MiddlewareRunner, StageReport};
