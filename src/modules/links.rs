//! Links registered by the backend for the current page.
//!
//! Every page response carries a `links` object on the transport level. The
//! repository mirrors it into the store on navigation; lookups return an
//! empty string for unknown keys.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::event::names::HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION;
use crate::event::EventBus;
use crate::store::keys::PAGE_LINKS;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct LinkRepository {
    store: Arc<Store>,
}

impl LinkRepository {
    /// Creates the repository and subscribes it to navigation updates.
    #[must_use]
    pub fn new(store: Arc<Store>, bus: &EventBus) -> Self {
        let mirror = Arc::clone(&store);
        bus.on_fn(HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION, move |payload| {
            if let Some(state) = payload.state() {
                mirror.set(
                    PAGE_LINKS,
                    Value::Object(state.response().links.clone()),
                );
            }
        });
        Self { store }
    }

    /// The link registered under a key, or `""` when unknown.
    #[must_use]
    pub fn get(&self, key: &str) -> String {
        self.all()
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// True if a non-empty link is registered under the key.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        !self.get(key).is_empty()
    }

    /// All links of the current page.
    #[must_use]
    pub fn all(&self) -> Map<String, Value> {
        self.store
            .get(PAGE_LINKS, Value::Object(Map::new()))
            .as_object()
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Resource, ResponseMeta};
    use crate::event::HookPayload;
    use serde_json::json;

    #[tokio::test]
    async fn links_follow_the_navigation_response() {
        let store = Arc::new(Store::new());
        let bus = EventBus::new();
        let repo = LinkRepository::new(Arc::clone(&store), &bus);
        assert_eq!(repo.get("self"), "");
        assert!(!repo.has("self"));

        let mut response = ResponseMeta::ok();
        response
            .links
            .insert("self".to_string(), json!("https://example.org/about"));
        let state = Resource::new(json!({"id": 1}), response);

        let mut payload = HookPayload::new();
        payload.set_state(&state);
        bus.emit_hook(HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION, payload)
            .await
            .unwrap();

        assert_eq!(repo.get("self"), "https://example.org/about");
        assert!(repo.has("self"));
        assert_eq!(repo.all().len(), 1);
    }
}
