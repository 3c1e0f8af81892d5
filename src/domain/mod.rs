//! Core domain types shared across all layers.
//!
//! This layer has no dependencies on the rest of the crate: value types for
//! routes and server resources, plus the central error type.

pub mod error;
pub mod resource;
pub mod route;

pub use error::{BridgeError, Result};
pub use resource::{Collection, Resource, ResponseMeta};
pub use route::Route;
