//! Error classification, central handling and the mode-specific strategies.

pub mod app_error;
pub mod handler;
pub mod hybrid;
pub mod spa;

pub use app_error::{AppError, AppErrorType, FailureReason};
pub use handler::{
    ConcreteErrorHandler, ContentElementErrorScope, ErrorHandler, HandlerContext, HandlerFlags,
};
pub use hybrid::hybrid_error_handler;
pub use spa::spa_error_handler;
