//! Minimal reactive key/value store.
//!
//! The store is the leaf dependency of every stateful component in the
//! framework: keyed, independently-reactive slots holding JSON values. A
//! `set` notifies all watchers of that key synchronously with the new and
//! previous value, exactly one notification per `set`, never coalesced.
//! There is deliberately no cross-key atomicity.

pub mod keys;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Callback invoked with `(new_value, old_value)` when a watched key changes.
pub type Watcher = Arc<dyn Fn(&Value, Option<&Value>) + Send + Sync>;

/// Identifies one registered watcher so it can be unbound again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchHandle {
    key: String,
    id: u64,
}

#[derive(Default)]
struct StoreState {
    values: HashMap<String, Value>,
    watchers: HashMap<String, Vec<(u64, Watcher)>>,
}

/// A super simple observable state container.
///
/// Designed as a lightweight alternative to a full state-management layer for
/// the handful of keys the framework shares between its subsystems (see
/// [`keys`]).
#[derive(Default)]
pub struct Store {
    state: Mutex<StoreState>,
    next_watcher_id: AtomicU64,
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with initial values.
    ///
    /// Used at bootstrap to apply the application's `initial_store`
    /// configuration before any subsystem subscribes.
    #[must_use]
    pub fn with_initial(initial: Map<String, Value>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().expect("store lock poisoned");
            for (key, value) in initial {
                state.values.insert(key, value);
            }
        }
        store
    }

    /// Returns true if the store holds a value for the given key.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.state
            .lock()
            .expect("store lock poisoned")
            .values
            .contains_key(key)
    }

    /// Returns the value for a key, or `default` if the key is unset.
    #[must_use]
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.state
            .lock()
            .expect("store lock poisoned")
            .values
            .get(key)
            .cloned()
            .unwrap_or(default)
    }

    /// Returns the value for a key deserialized into `T`, or `None` if the
    /// key is unset or does not match the requested shape.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self
            .state
            .lock()
            .expect("store lock poisoned")
            .values
            .get(key)
            .cloned()?;
        serde_json::from_value(value).ok()
    }

    /// Returns the boolean value for a key, or `default`.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key, Value::Bool(default)) {
            Value::Bool(b) => b,
            _ => default,
        }
    }

    /// Updates or sets the value of a key and notifies its watchers.
    ///
    /// Watchers run synchronously on the calling thread, outside the store
    /// lock, in an unspecified order.
    pub fn set(&self, key: &str, value: Value) {
        let (old, watchers) = {
            let mut state = self.state.lock().expect("store lock poisoned");
            let old = state.values.insert(key.to_string(), value.clone());
            let watchers: Vec<Watcher> = state
                .watchers
                .get(key)
                .map(|list| list.iter().map(|(_, w)| Arc::clone(w)).collect())
                .unwrap_or_default();
            (old, watchers)
        };
        tracing::trace!(key, watcher_count = watchers.len(), "store key updated");
        for watcher in watchers {
            watcher(&value, old.as_ref());
        }
    }

    /// Removes a key without notifying watchers. Used by the shell to clear
    /// transient override slots.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.state
            .lock()
            .expect("store lock poisoned")
            .values
            .remove(key)
    }

    /// Watches a key for changes.
    ///
    /// The callback receives the new and the previous value on every `set` of
    /// that key until the returned handle is passed to [`Store::unwatch`].
    pub fn watch(
        &self,
        key: &str,
        callback: impl Fn(&Value, Option<&Value>) + Send + Sync + 'static,
    ) -> WatchHandle {
        let id = self.next_watcher_id.fetch_add(1, Ordering::Relaxed);
        self.state
            .lock()
            .expect("store lock poisoned")
            .watchers
            .entry(key.to_string())
            .or_default()
            .push((id, Arc::new(callback)));
        WatchHandle {
            key: key.to_string(),
            id,
        }
    }

    /// Unbinds a previously registered watcher.
    pub fn unwatch(&self, handle: &WatchHandle) {
        if let Some(list) = self
            .state
            .lock()
            .expect("store lock poisoned")
            .watchers
            .get_mut(&handle.key)
        {
            list.retain(|(id, _)| *id != handle.id);
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("store lock poisoned");
        f.debug_struct("Store")
            .field("keys", &state.values.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
