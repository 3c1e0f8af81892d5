//! Tracing initialization.
//!
//! The framework logs through `tracing` throughout; this sets up a plain
//! formatted subscriber for hosts that do not install their own.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::bootstrap::FrameworkRuntime;

/// Initializes the tracing subscriber once per runtime.
///
/// The filter is taken from `RUST_LOG` when set, falling back to the
/// configured trace level and then to `"info"`. Safe to call multiple times;
/// only the first call per runtime takes effect, and an already-installed
/// host subscriber wins silently.
pub fn init_tracing(runtime: &FrameworkRuntime, trace_level: Option<&str>) {
    if !runtime.mark_tracing_initialized() {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(trace_level.unwrap_or("info")));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    let _ = subscriber.try_init();
}
