//! Pipeline states and diagnostic flags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A state of the request pipeline.
///
/// ```text
/// Init ─► Validating ─┬─► ValidateFailed ──────────────────────────────┐
///                     └─► BeforeMiddlewareRunning ─┬─► BeforeMiddlewareFailed ─┤
///                                                  └─► CallbackRunning ─┬─► CallbackFailed ─┤
///                                                                       │                   ▼
///                                                                       └────────► AfterMiddlewareRunning
///                                                                                    ├─► AfterMiddlewareFailed ─► SendError
///                                                                                    └─► SendSuccess | SendError
/// ```
///
/// After-middleware runs for every request; only the choice of terminal
/// send depends on earlier failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Created, nothing run yet.
    Init,
    /// Validating headers, cookies, query and body.
    Validating,
    /// Validation failed.
    ValidateFailed,
    /// Running before-middleware.
    BeforeMiddlewareRunning,
    /// A before-middleware failed.
    BeforeMiddlewareFailed,
    /// Running the route callback.
    CallbackRunning,
    /// The callback or its output validation failed.
    CallbackFailed,
    /// Running after-middleware.
    AfterMiddlewareRunning,
    /// An after-middleware failed.
    AfterMiddlewareFailed,
    /// Sending the success reply (terminal).
    SendSuccess,
    /// Sending the error reply (terminal).
    SendError,
}

impl PipelineState {
    /// Returns `true` for the two send states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::SendSuccess | Self::SendError)
    }

    /// Returns the snake-case name of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Validating => "validating",
            Self::ValidateFailed => "validate_failed",
            Self::BeforeMiddlewareRunning => "before_middleware_running",
            Self::BeforeMiddlewareFailed => "before_middleware_failed",
            Self::CallbackRunning => "callback_running",
            Self::CallbackFailed => "callback_failed",
            Self::AfterMiddlewareRunning => "after_middleware_running",
            Self::AfterMiddlewareFailed => "after_middleware_failed",
            Self::SendSuccess => "send_success",
            Self::SendError => "send_error",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request diagnostic flags, included in error replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineFlags {
    /// A terminal reply was sent.
    pub reply_sent: bool,
    /// Input validation failed.
    pub validate_failed: bool,
    /// The callback failed or returned an invalid output.
    pub callback_errored: bool,
    /// An after-middleware failed.
    pub after_middleware_errored: bool,
    /// A before-middleware failed.
    ///
    /// Diagnostic only: kept on [`PipelineOutcome`](crate::PipelineOutcome)
    /// and never written to the error body.
    #[serde(skip)]
    pub before_middleware_errored: bool,
}

impl PipelineFlags {
    /// Returns `true` if any stage failed.
    #[must_use]
    pub fn any_failed(&self) -> bool {
        self.validate_failed
            || self.before_middleware_errored
            || self.callback_errored
            || self.after_middleware_errored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::SendSuccess.is_terminal());
        assert!(PipelineState::SendError.is_terminal());
        assert!(!PipelineState::AfterMiddlewareFailed.is_terminal());
    }

    #[test]
    fn test_state_names_match_serde() {
        let state = PipelineState::BeforeMiddlewareRunning;
        assert_eq!(
            serde_json::to_value(state).unwrap(),
            json!(state.as_str())
        );
    }

    #[test]
    fn test_flags_wire_shape() {
        let flags = PipelineFlags {
            validate_failed: true,
            before_middleware_errored: true,
            ..PipelineFlags::default()
        };
        assert!(flags.any_failed());
        assert_eq!(
            serde_json::to_value(flags).unwrap(),
            json!({
                "reply_sent": false,
                "validate_failed": true,
                "callback_errored": false,
                "after_middleware_errored": false
            })
        );
    }
}
