//! Ordered, asynchronous, mutation-passing pub/sub.
//!
//! Two primitives back every cross-cutting extension point of the framework:
//!
//! - [`EventBus::emit`]: fire-and-forget notification; listener failures are
//!   logged and swallowed, never propagated to the emitter.
//! - [`EventBus::emit_hook`]: a sequential pipeline where listeners run in
//!   registration order, each receives the payload as mutated by its
//!   predecessors, and the final payload is returned to the caller. Hooks
//!   never short-circuit; cancellation is expressed through boolean fields on
//!   the payload, not through early exit.
//!
//! Each pipeline call snapshots the listener list up front, so concurrent
//! `emit_hook` calls on the same event cannot interleave each other's
//! iteration (no shared cursor).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{BridgeError, Resource, Result, Route};

/// The payload threaded through listeners of one event or hook.
///
/// A thin wrapper around a JSON map with typed accessors for the slots the
/// framework itself uses. Filters must extend the shape they received, not
/// replace it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookPayload(Map<String, Value>);

impl HookPayload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value of a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Sets a raw field value.
    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    /// Builder-style variant of [`HookPayload::set`].
    #[must_use]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.set(key, value);
        self
    }

    /// Serializes `value` into a field.
    pub fn set_json<T: Serialize>(&mut self, key: &str, value: &T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.0.insert(key.to_string(), v);
        }
    }

    /// Builder-style variant of [`HookPayload::set_json`].
    #[must_use]
    pub fn with_json<T: Serialize>(mut self, key: &str, value: &T) -> Self {
        self.set_json(key, value);
        self
    }

    /// Deserializes a field into `T`.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Reads a boolean field, treating a missing field as `false`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// The page state resource carried by navigation payloads.
    #[must_use]
    pub fn state(&self) -> Option<Resource> {
        self.get_as("state")
    }

    /// Stores the page state resource on the payload.
    pub fn set_state(&mut self, state: &Resource) {
        self.set_json("state", state);
    }

    /// Reads a route field (`"to"` / `"from"`).
    #[must_use]
    pub fn route(&self, key: &str) -> Option<Route> {
        self.get_as(key)
    }

    /// The underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for HookPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Future returned by a listener, resolving to the (possibly mutated) payload.
pub type ListenerFuture = BoxFuture<'static, Result<HookPayload>>;

/// A bound listener. Receives the payload by value and returns it, mutated or
/// not, so pipelines can thread state without shared mutability.
pub type Listener = Arc<dyn Fn(HookPayload) -> ListenerFuture + Send + Sync>;

/// Identifies one bound listener so it can be unbound again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerHandle {
    event: String,
    id: u64,
}

/// The framework-wide event bus.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<String, Vec<(u64, Listener)>>>,
    next_listener_id: AtomicU64,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an asynchronous listener to an event or hook.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerHandle
    where
        F: Fn(HookPayload) -> ListenerFuture + Send + Sync + 'static,
    {
        self.bind(event, Arc::new(listener))
    }

    /// Binds a synchronous listener that mutates the payload in place.
    ///
    /// Convenience wrapper for the common case of repositories deriving state
    /// from a navigation payload without any awaiting of their own.
    pub fn on_fn<F>(&self, event: &str, listener: F) -> ListenerHandle
    where
        F: Fn(&mut HookPayload) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        self.bind(
            event,
            Arc::new(move |mut payload: HookPayload| {
                let listener = Arc::clone(&listener);
                Box::pin(async move {
                    listener(&mut payload);
                    Ok(payload)
                }) as ListenerFuture
            }),
        )
    }

    /// Binds an already-shared listener, as carried by configuration event
    /// bindings.
    pub fn on_listener(&self, event: &str, listener: Listener) -> ListenerHandle {
        self.bind(event, listener)
    }

    /// Unbinds a previously bound listener.
    pub fn off(&self, handle: &ListenerHandle) {
        if let Some(list) = self
            .listeners
            .lock()
            .expect("event bus lock poisoned")
            .get_mut(&handle.event)
        {
            list.retain(|(id, _)| *id != handle.id);
        }
    }

    /// Number of listeners currently bound to an event.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .expect("event bus lock poisoned")
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Fire-and-forget notification to all bound listeners.
    ///
    /// Listeners run sequentially in registration order; a failing listener
    /// is logged and does not affect the others or the emitter.
    pub async fn emit(&self, event: &str, payload: HookPayload) {
        let snapshot = self.snapshot(event);
        tracing::trace!(event, listeners = snapshot.len(), "emit");
        for listener in snapshot {
            if let Err(err) = listener(payload.clone()).await {
                tracing::warn!(event, error = %err, "event listener failed");
            }
        }
    }

    /// Sequential mutation-passing pipeline.
    ///
    /// Every bound listener runs, in registration order, each receiving the
    /// payload returned by its predecessor. The final payload is returned to
    /// the caller. A listener error aborts the pipeline and is propagated.
    pub async fn emit_hook(&self, event: &str, payload: HookPayload) -> Result<HookPayload> {
        let snapshot = self.snapshot(event);
        tracing::trace!(event, listeners = snapshot.len(), "emit_hook");
        let mut current = payload;
        for listener in snapshot {
            current = listener(current).await.map_err(|err| match err {
                BridgeError::Listener(msg) => {
                    BridgeError::Listener(format!("{event}: {msg}"))
                }
                other => other,
            })?;
        }
        Ok(current)
    }

    fn bind(&self, event: &str, listener: Listener) -> ListenerHandle {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .expect("event bus lock poisoned")
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        ListenerHandle {
            event: event.to_string(),
            id,
        }
    }

    fn snapshot(&self, event: &str) -> Vec<Listener> {
        self.listeners
            .lock()
            .expect("event bus lock poisoned")
            .get(event)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.lock().expect("event bus lock poisoned");
        f.debug_struct("EventBus")
            .field("events", &listeners.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
