//! The page context: everything known about the currently served page.
//!
//! All page state lives in the reactive store under the `framework:page:*`
//! keys; the context is a typed facade over those keys plus the ancillary
//! repositories. It commits navigations through the internal
//! after-navigation hook, so the commit participates in the same ordered
//! pipeline as the repositories.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use crate::api::{ResourceClient, ResourceQuery};
use crate::domain::{Resource, Result, Route};
use crate::event::names::HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION;
use crate::event::EventBus;
use crate::modules::{LinkRepository, PageMeta, PidRepository};
use crate::render::{ComponentRef, Router};
use crate::store::keys::{
    PAGE_COMMON_ELEMENTS, PAGE_DATA, PAGE_ROUTE, PAGE_SITE_URL, PAGE_STATE,
};
use crate::store::Store;

/// Layout key assumed when a page names none.
pub const DEFAULT_LAYOUT: &str = "default";

pub struct PageContext {
    store: Arc<Store>,
    client: Arc<dyn ResourceClient>,
    layout_components: BTreeMap<String, ComponentRef>,
    router: Mutex<Option<Arc<dyn Router>>>,
    page_meta: Mutex<Option<PageMeta>>,
    pid: PidRepository,
    links: LinkRepository,
}

impl PageContext {
    /// Creates the context, seeds the store and subscribes the commit and
    /// the repositories to the internal after-navigation hook.
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        bus: &EventBus,
        client: Arc<dyn ResourceClient>,
        site_url: &str,
        layout_components: BTreeMap<String, ComponentRef>,
    ) -> Arc<Self> {
        store.set(PAGE_SITE_URL, json!(site_url));
        store.set(PAGE_COMMON_ELEMENTS, json!({}));

        let commit_store = Arc::clone(&store);
        bus.on_fn(HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION, move |payload| {
            if let Some(state) = payload.state() {
                commit(&commit_store, &state, payload.route("to").as_ref());
            }
        });

        Arc::new(Self {
            pid: PidRepository::new(Arc::clone(&store), bus),
            links: LinkRepository::new(Arc::clone(&store), bus),
            store,
            client,
            layout_components,
            router: Mutex::new(None),
            page_meta: Mutex::new(None),
        })
    }

    /// Commits a page state outside of a navigation, e.g. from tests or a
    /// host-driven refresh.
    pub fn set_current_page(&self, state: &Resource, to: Option<&Route>) {
        commit(&self.store, state, to);
    }

    /// The raw state of the current page. Empty before the first navigation.
    #[must_use]
    pub fn state(&self) -> Resource {
        self.store.get_as(PAGE_STATE).unwrap_or_default()
    }

    /// The `data` view of the current page.
    #[must_use]
    pub fn data(&self) -> Value {
        self.store.get(PAGE_DATA, json!({}))
    }

    /// The route the current page was served under.
    #[must_use]
    pub fn current_route(&self) -> Option<Route> {
        self.store.get_as(PAGE_ROUTE)
    }

    /// Backend id of the current page, `-1` before the first navigation.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.state().get_i64("id", -1)
    }

    /// Language the current page is served in.
    #[must_use]
    pub fn language_code(&self) -> String {
        self.state().get_str("languageCode", "en")
    }

    /// Layout key of the current page.
    #[must_use]
    pub fn layout(&self) -> String {
        self.state().get_str("pageLayout", DEFAULT_LAYOUT)
    }

    /// The layout component for the current page, falling back to the
    /// default layout entry.
    #[must_use]
    pub fn layout_component(&self) -> Option<ComponentRef> {
        self.layout_components
            .get(&self.layout())
            .or_else(|| self.layout_components.get(DEFAULT_LAYOUT))
            .cloned()
    }

    /// Breadcrumb line from the root page down to the current one.
    #[must_use]
    pub fn root_line(&self) -> Value {
        self.state().get("rootLine", json!([]))
    }

    /// Child content nodes of the current page.
    #[must_use]
    pub fn content_children(&self) -> Value {
        self.state().get("content.children", json!({}))
    }

    /// True when the page is served through the CMS preview.
    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.state().get_bool("isPreview", false)
    }

    /// The site base URL of the current page.
    #[must_use]
    pub fn site_url(&self) -> String {
        self.store
            .get(PAGE_SITE_URL, json!(""))
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    /// All loaded common elements, keyed by element id.
    #[must_use]
    pub fn common_elements(&self) -> Map<String, Value> {
        self.store
            .get(PAGE_COMMON_ELEMENTS, json!({}))
            .as_object()
            .cloned()
            .unwrap_or_default()
    }

    /// One loaded common element by id.
    #[must_use]
    pub fn common_element(&self, id: &str) -> Option<Value> {
        self.common_elements().get(id).cloned()
    }

    /// Re-fetches one common element and merges it into the store.
    pub async fn refresh_common_element(&self, key: &str) -> Result<()> {
        let resource = self
            .client
            .get_resource("commonElement", key, &ResourceQuery::default())
            .await?;
        let id = resource.get_str("id", key);
        let element = resource.get("element", Value::Null);
        let mut elements = self.common_elements();
        elements.insert(id, element);
        self.store.set(PAGE_COMMON_ELEMENTS, Value::Object(elements));
        Ok(())
    }

    #[must_use]
    pub fn router(&self) -> Option<Arc<dyn Router>> {
        self.router.lock().expect("page context lock poisoned").clone()
    }

    pub fn install_router(&self, router: Arc<dyn Router>) {
        *self.router.lock().expect("page context lock poisoned") = Some(router);
    }

    #[must_use]
    pub fn page_meta(&self) -> Option<PageMeta> {
        self.page_meta
            .lock()
            .expect("page context lock poisoned")
            .clone()
    }

    pub fn install_page_meta(&self, meta: PageMeta) {
        *self.page_meta.lock().expect("page context lock poisoned") = Some(meta);
    }

    #[must_use]
    pub fn pid_repository(&self) -> &PidRepository {
        &self.pid
    }

    #[must_use]
    pub fn link_repository(&self) -> &LinkRepository {
        &self.links
    }
}

impl std::fmt::Debug for PageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageContext")
            .field("id", &self.id())
            .field("layout", &self.layout())
            .field("route", &self.current_route())
            .finish_non_exhaustive()
    }
}

fn commit(store: &Store, state: &Resource, to: Option<&Route>) {
    if let Some(route) = to {
        if let Ok(value) = serde_json::to_value(route) {
            store.set(PAGE_ROUTE, value);
        }
    }
    if let Ok(value) = serde_json::to_value(state) {
        store.set(PAGE_STATE, value);
    }
    store.set(PAGE_DATA, state.get("data", json!({})));

    let site_url = state.get_str("siteUrl", "");
    if !site_url.is_empty() {
        let current = store.get(PAGE_SITE_URL, json!(""));
        if current.as_str() != Some(site_url.as_str()) {
            store.set(PAGE_SITE_URL, json!(site_url));
        }
    }

    if let Value::Array(entries) = state.get("common", json!([])) {
        let mut elements = store
            .get(PAGE_COMMON_ELEMENTS, json!({}))
            .as_object()
            .cloned()
            .unwrap_or_default();
        for entry in entries {
            let id = entry.get("id").and_then(Value::as_str).unwrap_or_default();
            if id.is_empty() {
                continue;
            }
            let element = entry.get("element").cloned().unwrap_or(Value::Null);
            elements.insert(id.to_string(), element);
        }
        store.set(PAGE_COMMON_ELEMENTS, Value::Object(elements));
    }
}
