//! Ordered component resolution.
//!
//! Component lookup by string key runs through an explicit, fixed-order list
//! of strategies: the local registry, then the parent registry (hybrid child
//! contexts inherit their parent's components), then an optional asynchronous
//! resolver plugin, then not-found. Each strategy returns an optional match
//! and the first hit wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;

use super::ComponentRef;

/// Outcome of a resolution attempt, tagged with the strategy that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Found in the chain's own registry.
    Local(ComponentRef),
    /// Found in the parent chain's registry.
    Parent(ComponentRef),
    /// Produced by the dynamic resolver plugin.
    Dynamic(ComponentRef),
    /// No strategy matched.
    NotFound,
}

impl Resolution {
    /// The resolved component, if any strategy matched.
    #[must_use]
    pub fn component(&self) -> Option<&ComponentRef> {
        match self {
            Self::Local(c) | Self::Parent(c) | Self::Dynamic(c) => Some(c),
            Self::NotFound => None,
        }
    }
}

/// Asynchronous resolver plugin, e.g. for lazily loaded component bundles.
pub trait DynamicComponentResolver: Send + Sync {
    /// Resolves a component key, or `None` if this plugin does not know it.
    fn resolve(&self, key: &str) -> BoxFuture<'static, Option<ComponentRef>>;
}

/// The ordered resolver chain.
#[derive(Clone, Default)]
pub struct ComponentResolverChain {
    local: Arc<Mutex<HashMap<String, ComponentRef>>>,
    parent: Option<Arc<ComponentResolverChain>>,
    dynamic: Option<Arc<dyn DynamicComponentResolver>>,
}

impl ComponentResolverChain {
    /// Creates an empty chain without parent or plugin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child chain that falls back to `parent` before the dynamic
    /// resolver.
    #[must_use]
    pub fn with_parent(parent: Arc<ComponentResolverChain>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    /// Installs the dynamic resolver plugin.
    #[must_use]
    pub fn with_dynamic(mut self, resolver: Arc<dyn DynamicComponentResolver>) -> Self {
        self.dynamic = Some(resolver);
        self
    }

    /// Registers a component in the local registry.
    pub fn register(&self, key: &str, component: ComponentRef) {
        self.local
            .lock()
            .expect("resolver lock poisoned")
            .insert(key.to_string(), component);
    }

    /// Looks up a key in the local registry only.
    #[must_use]
    pub fn lookup_local(&self, key: &str) -> Option<ComponentRef> {
        self.local
            .lock()
            .expect("resolver lock poisoned")
            .get(key)
            .cloned()
    }

    /// Resolves a component key through the strategy chain.
    pub async fn resolve(&self, key: &str) -> Resolution {
        if let Some(found) = self.lookup_local(key) {
            return Resolution::Local(found);
        }
        if let Some(parent) = &self.parent {
            if let Some(found) = parent.lookup_local(key) {
                return Resolution::Parent(found);
            }
        }
        if let Some(dynamic) = &self.dynamic {
            if let Some(found) = dynamic.resolve(key).await {
                return Resolution::Dynamic(found);
            }
        }
        tracing::debug!(key, "component key did not resolve");
        Resolution::NotFound
    }
}

impl std::fmt::Debug for ComponentResolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentResolverChain")
            .field("has_parent", &self.parent.is_some())
            .field("has_dynamic", &self.dynamic.is_some())
            .finish_non_exhaustive()
    }
}
