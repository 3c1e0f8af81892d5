//! Translation catalogues and the active locale.
//!
//! Catalogues arrive in two ways: embedded in a page response (the backend
//! sends the catalogue for a language the client has not announced as
//! loaded) or through an explicit locale switch, which fetches the
//! `pageTranslation` resource. Concurrent identical fetches are collapsed
//! through the request deduplicator. Every locale change updates the
//! registered request decorators so subsequent backend calls carry the
//! active language header, and emits the language-changed event.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use serde_json::{json, Map, Value};

use crate::api::{RequestDecorator, RequestDeduper, ResourceClient, ResourceQuery};
use crate::domain::{BridgeError, Resource, Result};
use crate::event::names::{EVENT_LANGUAGE_CHANGED, HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION};
use crate::event::{EventBus, HookPayload};

/// Header announcing the active language to the backend.
pub const LANGUAGE_HEADER: &str = "x-frontend-language";

struct TranslationState {
    locale: Mutex<String>,
    catalogues: Mutex<HashMap<String, Map<String, Value>>>,
    site_locales: Mutex<Vec<String>>,
    sinks: Mutex<Vec<Arc<dyn RequestDecorator>>>,
    bus: Weak<EventBus>,
    client: Arc<dyn ResourceClient>,
    deduper: RequestDeduper,
}

/// The translation service. Cheap to clone.
#[derive(Clone)]
pub struct Translation {
    state: Arc<TranslationState>,
}

impl Translation {
    /// Creates the service and subscribes it to navigation updates.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>, bus: &Arc<EventBus>, initial_locale: &str) -> Self {
        let state = Arc::new(TranslationState {
            locale: Mutex::new(initial_locale.to_string()),
            catalogues: Mutex::new(HashMap::new()),
            site_locales: Mutex::new(vec![initial_locale.to_string()]),
            sinks: Mutex::new(Vec::new()),
            bus: Arc::downgrade(bus),
            client,
            deduper: RequestDeduper::new(),
        });

        let bound = Arc::clone(&state);
        bus.on(HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION, move |payload| {
            let state = Arc::clone(&bound);
            Box::pin(async move {
                if let Some(page_state) = payload.state() {
                    apply_navigation(&state, &page_state).await;
                }
                Ok(payload)
            })
        });

        Self { state }
    }

    /// The currently active locale.
    #[must_use]
    pub fn language_code(&self) -> String {
        self.state.locale.lock().expect("translation lock poisoned").clone()
    }

    /// Languages a catalogue is held for, sorted.
    #[must_use]
    pub fn loaded_language_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self
            .state
            .catalogues
            .lock()
            .expect("translation lock poisoned")
            .keys()
            .cloned()
            .collect();
        codes.sort();
        codes
    }

    /// Languages the current site offers.
    #[must_use]
    pub fn site_language_codes(&self) -> Vec<String> {
        self.state
            .site_locales
            .lock()
            .expect("translation lock poisoned")
            .clone()
    }

    /// Registers a request decorator and pushes the active language header
    /// onto it immediately.
    pub fn register_header_sink(&self, sink: Arc<dyn RequestDecorator>) {
        sink.set_default_header(LANGUAGE_HEADER, &self.language_code());
        self.state
            .sinks
            .lock()
            .expect("translation lock poisoned")
            .push(sink);
    }

    /// Translates a message key in the active locale.
    #[must_use]
    pub fn translate(&self, key: &str) -> Option<String> {
        let locale = self.language_code();
        self.state
            .catalogues
            .lock()
            .expect("translation lock poisoned")
            .get(&locale)
            .and_then(|catalogue| catalogue.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Translates a message key, falling back to `fallback`.
    #[must_use]
    pub fn translate_or(&self, key: &str, fallback: &str) -> String {
        self.translate(key).unwrap_or_else(|| fallback.to_string())
    }

    /// Installs a catalogue without activating it.
    pub fn install_catalogue(&self, id: &str, messages: Map<String, Value>) {
        self.state
            .catalogues
            .lock()
            .expect("translation lock poisoned")
            .insert(id.to_string(), messages);
    }

    /// Installs a catalogue from an embedded JSON value, as injected into
    /// hybrid pages. The value must carry a string `id` and an object
    /// `message`.
    pub fn install_catalogue_value(&self, value: &Value) -> Result<()> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::Config("translation catalogue misses an id".into()))?;
        let messages = value
            .get("message")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                BridgeError::Config("translation catalogue misses a message object".into())
            })?;
        self.install_catalogue(id, messages.clone());
        Ok(())
    }

    /// Switches the active locale, fetching the catalogue first when it is
    /// not held yet. A no-op when `code` is already active.
    pub async fn set_locale(&self, code: &str) -> Result<()> {
        if self.language_code() == code {
            return Ok(());
        }
        let loaded = self
            .state
            .catalogues
            .lock()
            .expect("translation lock poisoned")
            .contains_key(code);
        if !loaded {
            let client = Arc::clone(&self.state.client);
            let fetch_code = code.to_string();
            let resource = self
                .state
                .deduper
                .run(&format!("translation:{code}"), move || {
                    Box::pin(async move {
                        client
                            .get_resource("pageTranslation", &fetch_code, &ResourceQuery::default())
                            .await
                    })
                })
                .await?;
            let messages = resource
                .get("message", json!({}))
                .as_object()
                .cloned()
                .unwrap_or_default();
            self.install_catalogue(code, messages);
        }
        activate(&self.state, code).await;
        Ok(())
    }
}

impl std::fmt::Debug for Translation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translation")
            .field("locale", &self.language_code())
            .field("loaded", &self.loaded_language_codes())
            .finish_non_exhaustive()
    }
}

async fn apply_navigation(state: &Arc<TranslationState>, page_state: &Resource) {
    if page_state.has("translation") {
        let id = page_state.get_str("translation.id", "");
        if !id.is_empty() {
            let messages = page_state
                .get("translation.message", json!({}))
                .as_object()
                .cloned()
                .unwrap_or_default();
            state
                .catalogues
                .lock()
                .expect("translation lock poisoned")
                .insert(id, messages);
        }
    }

    if let Some(codes) = page_state.get_as::<Vec<String>>("siteLanguageCodes") {
        *state.site_locales.lock().expect("translation lock poisoned") = codes;
    }

    let language = page_state.get_str("languageCode", "");
    if !language.is_empty() {
        let current = state.locale.lock().expect("translation lock poisoned").clone();
        if language != current {
            activate(state, &language).await;
        }
    }
}

async fn activate(state: &Arc<TranslationState>, code: &str) {
    tracing::debug!(locale = code, "switching active locale");
    *state.locale.lock().expect("translation lock poisoned") = code.to_string();
    for sink in state.sinks.lock().expect("translation lock poisoned").iter() {
        sink.set_default_header(LANGUAGE_HEADER, code);
    }
    if let Some(bus) = state.bus.upgrade() {
        bus.emit(
            EVENT_LANGUAGE_CHANGED,
            HookPayload::new().with("languageCode", json!(code)),
        )
        .await;
    }
}
