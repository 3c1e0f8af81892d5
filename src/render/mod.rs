//! Seams towards the opaque UI collaborators.
//!
//! The navigation core never touches markup. It hands the renderer a
//! declarative [`RenderNode`] tree and talks to the host environment through
//! the narrow traits in this module: [`Renderer`] mounts trees, [`Router`]
//! performs programmatic navigation, [`ServerResponse`] carries
//! headers/status/redirects on the SSR side, [`BrowserLocation`] performs
//! hard redirects on the client, [`MetaSink`] refreshes the view layer's
//! document metadata, and [`MarkupDocument`] enumerates hybrid widget mount
//! points in server-rendered markup.

pub mod resolver;

use std::collections::BTreeMap;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{Result, Route};

pub use resolver::{ComponentResolverChain, DynamicComponentResolver, Resolution};

/// Reference to a component known to the renderer, by registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentRef(pub String);

impl ComponentRef {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentRef {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// One node of a declarative render tree: a component reference, its props
/// and the listener names the renderer should wire up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderNode {
    /// The component to render.
    pub component: ComponentRef,

    /// Props passed to the component.
    #[serde(default)]
    pub props: Map<String, Value>,

    /// Event listener names the renderer binds back to the host.
    #[serde(default)]
    pub listeners: Vec<String>,

    /// Child nodes.
    #[serde(default)]
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    /// Creates a leaf node without props.
    #[must_use]
    pub fn new(component: ComponentRef) -> Self {
        Self {
            component,
            props: Map::new(),
            listeners: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style prop setter.
    #[must_use]
    pub fn with_prop(mut self, key: &str, value: Value) -> Self {
        self.props.insert(key.to_string(), value);
        self
    }
}

/// The opaque component-tree renderer.
///
/// Accepts render descriptions and produces DOM or markup; the core never
/// sees either.
pub trait Renderer: Send + Sync {
    /// Mounts a tree at the element identified by `mount_point`.
    fn mount(&self, node: &RenderNode, mount_point: &str) -> Result<()>;
}

/// Programmatic navigation into the host router.
pub trait Router: Send + Sync {
    /// Replaces the current location with `path` and drives the usual
    /// navigation machinery.
    fn replace(&self, path: &str) -> BoxFuture<'static, Result<()>>;

    /// The route the router currently points at, if any navigation has
    /// settled yet.
    fn current_route(&self) -> Option<Route>;
}

/// The outgoing HTTP response during server-side rendering.
pub trait ServerResponse: Send + Sync {
    /// True once the response head has been flushed; all header mutation must
    /// be skipped from then on.
    fn headers_sent(&self) -> bool;

    /// Sets a response header.
    fn set_header(&self, name: &str, value: &str);

    /// Sets the response status code.
    fn set_status(&self, status: u16);

    /// Issues an HTTP redirect with the given status code.
    fn redirect(&self, status: u16, target: &str);
}

/// Client-side hard location changes (full page loads).
pub trait BrowserLocation: Send + Sync {
    /// Assigns a new location, leaving the application.
    fn assign(&self, url: &str);
}

/// The view layer's document-metadata plugin.
pub trait MetaSink: Send + Sync {
    /// Signals that the merged metadata changed and should be re-applied to
    /// the document.
    fn refresh(&self);
}

/// One content-element mount point found in server-rendered markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    /// Stable identifier of the element within the document.
    pub id: String,

    /// Attribute values present on the element.
    pub attributes: BTreeMap<String, String>,
}

impl ElementHandle {
    /// Returns an attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Read access to the server-rendered markup the hybrid mode hydrates.
pub trait MarkupDocument: Send + Sync {
    /// Returns all elements matching the content-element marker selector.
    fn select(&self, selector: &str) -> Vec<ElementHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_node_round_trips_through_json() {
        let node = RenderNode::new(ComponentRef::new("content-element"))
            .with_prop("definition", json!({"id": "ce-1"}));
        let value = serde_json::to_value(&node).unwrap();
        let back: RenderNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }
}
