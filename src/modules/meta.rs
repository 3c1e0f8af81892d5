//! Document metadata management.
//!
//! Static metadata from the configuration is merged with per-page metadata
//! derived from each navigation. Explicit setters push the merged result
//! into the host's [`MetaSink`] immediately; the after-navigation merge does
//! not, because the view layer re-reads metadata when it re-renders the page
//! anyway.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::Resource;
use crate::event::names::HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION;
use crate::event::{EventBus, ListenerHandle};
use crate::render::MetaSink;

/// One `<link>`-style entry, e.g. the canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaLink {
    pub rel: String,
    pub href: String,
}

/// A merged snapshot of document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageMetaInfo {
    /// Document title.
    pub title: Option<String>,

    /// `lang` attribute of the root element.
    pub html_lang: Option<String>,

    /// Link entries, canonical among them.
    pub links: Vec<MetaLink>,

    /// Raw meta tags as attribute maps.
    pub meta_tags: Vec<Map<String, Value>>,
}

impl PageMetaInfo {
    /// Overlays `other` on top of `self`. Fields `other` does not carry stay
    /// untouched; link entries are replaced per `rel`.
    pub fn merge(&mut self, other: &PageMetaInfo) {
        if other.title.is_some() {
            self.title = other.title.clone();
        }
        if other.html_lang.is_some() {
            self.html_lang = other.html_lang.clone();
        }
        for link in &other.links {
            self.links.retain(|existing| existing.rel != link.rel);
            self.links.push(link.clone());
        }
        if !other.meta_tags.is_empty() {
            self.meta_tags = other.meta_tags.clone();
        }
    }

    /// The canonical URL, when a canonical link entry exists.
    #[must_use]
    pub fn canonical(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == "canonical")
            .map(|link| link.href.as_str())
    }
}

struct MetaState {
    static_meta: PageMetaInfo,
    dynamic: Mutex<PageMetaInfo>,
    sink: Mutex<Option<Arc<dyn MetaSink>>>,
}

/// The page metadata service. Cheap to clone.
#[derive(Clone)]
pub struct PageMeta {
    state: Arc<MetaState>,
}

impl PageMeta {
    #[must_use]
    pub fn new(static_meta: PageMetaInfo) -> Self {
        Self {
            state: Arc::new(MetaState {
                static_meta,
                dynamic: Mutex::new(PageMetaInfo::default()),
                sink: Mutex::new(None),
            }),
        }
    }

    /// Subscribes the service to the internal after-navigation hook.
    pub fn bind(&self, bus: &EventBus) -> ListenerHandle {
        let state = Arc::clone(&self.state);
        bus.on_fn(HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION, move |payload| {
            if let Some(page_state) = payload.state() {
                let derived = derive_from_state(&page_state);
                state
                    .dynamic
                    .lock()
                    .expect("page meta lock poisoned")
                    .merge(&derived);
            }
        })
    }

    /// Installs the host's metadata sink.
    pub fn install_sink(&self, sink: Arc<dyn MetaSink>) {
        *self.state.sink.lock().expect("page meta lock poisoned") = Some(sink);
    }

    /// The merged metadata: static base overlaid with the dynamic part.
    #[must_use]
    pub fn metadata(&self) -> PageMetaInfo {
        let mut merged = self.state.static_meta.clone();
        merged.merge(&self.state.dynamic.lock().expect("page meta lock poisoned"));
        merged
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.state
            .dynamic
            .lock()
            .expect("page meta lock poisoned")
            .title = Some(title.into());
        self.refresh();
    }

    pub fn set_canonical(&self, href: impl Into<String>) {
        {
            let mut dynamic = self.state.dynamic.lock().expect("page meta lock poisoned");
            dynamic.links.retain(|link| link.rel != "canonical");
            dynamic.links.push(MetaLink {
                rel: "canonical".to_string(),
                href: href.into(),
            });
        }
        self.refresh();
    }

    pub fn set_html_lang(&self, lang: impl Into<String>) {
        self.state
            .dynamic
            .lock()
            .expect("page meta lock poisoned")
            .html_lang = Some(lang.into());
        self.refresh();
    }

    /// Overlays an arbitrary metadata fragment and refreshes the sink.
    pub fn set_raw(&self, fragment: &PageMetaInfo) {
        self.state
            .dynamic
            .lock()
            .expect("page meta lock poisoned")
            .merge(fragment);
        self.refresh();
    }

    fn refresh(&self) {
        if let Some(sink) = &*self.state.sink.lock().expect("page meta lock poisoned") {
            sink.refresh();
        }
    }
}

impl std::fmt::Debug for PageMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageMeta")
            .field("metadata", &self.metadata())
            .finish_non_exhaustive()
    }
}

fn derive_from_state(state: &Resource) -> PageMetaInfo {
    let mut derived = PageMetaInfo::default();
    let title = state.get_str("data.title", "");
    if !title.is_empty() {
        derived.title = Some(title);
    }
    let canonical = state.get_str("data.canonicalUrl", "");
    if !canonical.is_empty() {
        derived.links.push(MetaLink {
            rel: "canonical".to_string(),
            href: canonical,
        });
    }
    let lang = state.get_str("languageCode", "");
    if !lang.is_empty() {
        derived.html_lang = Some(lang);
    }
    if let Value::Array(tags) = state.get("data.metaTags", Value::Null) {
        derived.meta_tags = tags
            .into_iter()
            .filter_map(|tag| match tag {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
    }
    derived
}
