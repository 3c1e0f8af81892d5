//! Application bootstrap.
//!
//! Booting is an explicit sequence of named steps over a shared
//! [`FrameworkRuntime`]; [`spa::boot_spa`] and [`hybrid::boot_hybrid`]
//! compose them for the two application modes.

pub mod basic;
pub mod hybrid;
pub mod runtime;
pub mod spa;

pub use basic::{
    make_app_context, resolve_api_endpoints, resolve_environment, resolve_execution_side,
    ApiEndpoints, HostBindings,
};
pub use hybrid::boot_hybrid;
pub use runtime::FrameworkRuntime;
pub use spa::{boot_spa, compose_shell};
