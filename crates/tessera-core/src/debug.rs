//! Process-wide debug flag.
//!
//! The flag is the only piece of state shared by every request. It is written
//! once at startup (see `tessera-config`) and read on the hot path.

use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG: AtomicBool = AtomicBool::new(false);

/// Enables or disables debug diagnostics.
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
}

/// Returns `true` when debug diagnostics are enabled.
#[must_use]
pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}
