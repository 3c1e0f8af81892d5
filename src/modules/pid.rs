//! Backend page-id lookups.
//!
//! The backend ships a pid configuration with every page response: a map of
//! well-known names to page ids, so application code can link to pages
//! without hardcoding ids. The repository mirrors that map into the store on
//! every navigation and answers lookups with a `-1` fallback.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::domain::Resource;
use crate::event::names::HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION;
use crate::event::EventBus;
use crate::store::keys::{PAGE_PID_CONFIGURATION, PAGE_STATE};
use crate::store::Store;

/// Pid a lookup falls back to when the key is unknown.
pub const UNKNOWN_PID: i64 = -1;

#[derive(Debug, Clone)]
pub struct PidRepository {
    store: Arc<Store>,
}

impl PidRepository {
    /// Creates the repository and subscribes it to navigation updates.
    #[must_use]
    pub fn new(store: Arc<Store>, bus: &EventBus) -> Self {
        let mirror = Arc::clone(&store);
        bus.on_fn(HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION, move |payload| {
            if let Some(state) = payload.state() {
                mirror.set(PAGE_PID_CONFIGURATION, state.get("pidConfig", json!({})));
            }
        });
        Self { store }
    }

    /// The pid registered under a configuration key, or [`UNKNOWN_PID`].
    #[must_use]
    pub fn get_pid(&self, key: &str) -> i64 {
        self.get_pid_or(key, UNKNOWN_PID)
    }

    /// The pid registered under a configuration key, or `fallback`.
    #[must_use]
    pub fn get_pid_or(&self, key: &str, fallback: i64) -> i64 {
        Resource::from_embedded(self.configuration()).get_i64(key, fallback)
    }

    /// True if the configuration carries the given key.
    #[must_use]
    pub fn has_pid(&self, key: &str) -> bool {
        Resource::from_embedded(self.configuration()).has(key)
    }

    /// The full pid configuration map.
    #[must_use]
    pub fn configuration(&self) -> Value {
        self.store.get(PAGE_PID_CONFIGURATION, json!({}))
    }

    /// The pid of the currently served page, or [`UNKNOWN_PID`] before the
    /// first navigation.
    #[must_use]
    pub fn current_pid(&self) -> i64 {
        self.store
            .get_as::<Resource>(PAGE_STATE)
            .map_or(UNKNOWN_PID, |state| state.get_i64("id", UNKNOWN_PID))
    }
}
