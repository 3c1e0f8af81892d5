//! Event bus / hook pipeline layer.

pub mod bus;
pub mod names;

pub use bus::{EventBus, HookPayload, Listener, ListenerFuture, ListenerHandle};
