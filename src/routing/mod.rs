//! Navigation handling.

pub mod handler;
pub mod query;

pub use handler::{is_valid_transition, NavigationDecision, NavigationStage, RouteHandler};
pub use query::build_page_query;
