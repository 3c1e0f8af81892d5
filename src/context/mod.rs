//! Application, page and rendering contexts.

pub mod app;
pub mod page;
pub mod render;

pub use app::AppContext;
pub use page::{PageContext, DEFAULT_LAYOUT};
pub use render::RenderContext;
