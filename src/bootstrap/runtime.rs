//! Process-wide framework state.
//!
//! Bootstrapping used to rely on hidden globals for "only once" concerns;
//! the runtime makes them an explicit value the host creates and threads
//! through. Several application instances (e.g. hybrid widgets plus their
//! parent) share one runtime.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct FrameworkRuntime {
    tracing_initialized: AtomicBool,
}

impl FrameworkRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the tracing initialization. Returns `true` exactly once.
    pub(crate) fn mark_tracing_initialized(&self) -> bool {
        !self.tracing_initialized.swap(true, Ordering::SeqCst)
    }
}
