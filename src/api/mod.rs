//! Backend access seam.
//!
//! The core never performs HTTP itself; a host-provided [`ResourceClient`]
//! does. This module defines that trait, the query shape the route handler
//! builds, a request decorator seam for default headers (the translation
//! module pushes the active language through it), and an in-flight
//! deduplicator that collapses identical concurrent fetches into one
//! request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{Collection, Resource, Result};

/// Which fields of a resource the backend should include in the response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Include {
    /// Leave it to the backend's defaults.
    #[default]
    Default,
    /// Everything, serialized as `*`. Used for the first navigation.
    All,
    /// An explicit field list.
    Fields(Vec<String>),
}

impl Include {
    /// Wire representation of the include directive, if any.
    #[must_use]
    pub fn as_wire(&self) -> Option<String> {
        match self {
            Self::Default => None,
            Self::All => Some("*".to_string()),
            Self::Fields(fields) => Some(fields.join(",")),
        }
    }
}

/// Query parameters for a page or resource request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceQuery {
    /// Page slug being requested.
    pub slug: Option<String>,

    /// Include directive.
    pub include: Include,

    /// Layout currently rendered on the client, so the backend can skip
    /// layout-static parts.
    pub current_layout: Option<String>,

    /// Translation catalogues already held by the client.
    pub loaded_languages: Vec<String>,

    /// Common-element keys the backend should re-deliver.
    pub refresh_common: Option<String>,

    /// Free-form additional parameters added by query filter hooks.
    pub extra: Map<String, Value>,
}

impl ResourceQuery {
    /// Query for a slug with backend defaults.
    #[must_use]
    pub fn for_slug(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            ..Self::default()
        }
    }

    /// Flattens the query into wire key/value pairs, in a stable order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(slug) = &self.slug {
            pairs.push(("slug".to_string(), slug.clone()));
        }
        if let Some(include) = self.include.as_wire() {
            pairs.push(("include".to_string(), include));
        }
        if let Some(layout) = &self.current_layout {
            pairs.push(("currentLayout".to_string(), layout.clone()));
        }
        if !self.loaded_languages.is_empty() {
            pairs.push((
                "loadedLanguages".to_string(),
                self.loaded_languages.join(","),
            ));
        }
        if let Some(refresh) = &self.refresh_common {
            pairs.push(("refreshCommon".to_string(), refresh.clone()));
        }
        for (key, value) in &self.extra {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            pairs.push((key.clone(), rendered));
        }
        pairs
    }
}

/// The backend client the host injects during bootstrap.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetches a single addressable resource by type and id.
    async fn get_resource(
        &self,
        resource_type: &str,
        id: &str,
        query: &ResourceQuery,
    ) -> Result<Resource>;

    /// Fetches a resource collection by type.
    async fn get_collection(
        &self,
        resource_type: &str,
        query: &ResourceQuery,
    ) -> Result<Collection>;

    /// Fetches a non-addressable endpoint under a resource type, e.g. the
    /// by-slug page lookup.
    async fn get_additional(
        &self,
        resource_type: &str,
        uri_fragment: &str,
        query: &ResourceQuery,
    ) -> Result<Resource>;
}

/// Mutable default-header access on the outgoing request pipeline.
pub trait RequestDecorator: Send + Sync {
    /// Sets a header sent with every subsequent request.
    fn set_default_header(&self, name: &str, value: &str);
}

type SharedFetch = Shared<BoxFuture<'static, Result<Resource>>>;

/// Collapses concurrent identical requests into a single in-flight future.
///
/// Keyed by an arbitrary string; all callers arriving while a keyed fetch is
/// in flight await the same future and receive clones of its result.
#[derive(Default)]
pub struct RequestDeduper {
    in_flight: Mutex<HashMap<String, SharedFetch>>,
}

impl RequestDeduper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `make` under `key`, joining an already in-flight fetch instead
    /// when one exists.
    pub async fn run<F>(&self, key: &str, make: F) -> Result<Resource>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Resource>>,
    {
        self.run_with_delay(key, Duration::ZERO, make).await
    }

    /// Like [`RequestDeduper::run`], but the underlying fetch starts only
    /// after `delay`. Calls arriving within the window join the pending
    /// fetch, which debounces request bursts.
    pub async fn run_with_delay<F>(&self, key: &str, delay: Duration, make: F) -> Result<Resource>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Resource>>,
    {
        let (fetch, owner) = {
            let mut in_flight = self.in_flight.lock().expect("deduper lock poisoned");
            match in_flight.get(key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    tracing::trace!(key, "starting deduplicated fetch");
                    let fut = make();
                    let shared = async move {
                        if delay > Duration::ZERO {
                            tokio::time::sleep(delay).await;
                        }
                        fut.await
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key.to_string(), shared.clone());
                    (shared, true)
                }
            }
        };

        let result = fetch.await;
        if owner {
            self.in_flight
                .lock()
                .expect("deduper lock poisoned")
                .remove(key);
        }
        result
    }

    /// Number of fetches currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().expect("deduper lock poisoned").len()
    }
}

impl std::fmt::Debug for RequestDeduper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDeduper")
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

// The trait object is what everything downstream stores.
pub type SharedResourceClient = Arc<dyn ResourceClient>;
