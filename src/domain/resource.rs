//! Read-only views over deserialized server payloads.
//!
//! [`Resource`] and [`Collection`] wrap the JSON body of a backend response
//! together with its transport metadata ([`ResponseMeta`]). They are the only
//! shape in which server state travels through the navigation core: consumers
//! read them through dotted-path getters with defaults and never mutate them.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Transport-level metadata of the response a resource was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// HTTP status code of the response.
    pub status: u16,

    /// Response headers with lowercased names.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// The JSON:API `links` object of the response, if any.
    #[serde(default)]
    pub links: Map<String, Value>,
}

impl ResponseMeta {
    /// Creates metadata for a plain success response.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            links: Map::new(),
        }
    }

    /// Creates metadata with the given status code.
    #[must_use]
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::ok()
        }
    }

    /// Returns a header value by its lowercased name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// A single deserialized server entity.
///
/// The attribute payload is held as raw JSON; [`Resource::get`] resolves
/// dotted paths (`"content.children"`, `"data.title"`) against it. A missing
/// path yields the caller's default, never an error, which is what lets
/// dependent subsystems run before the first navigation has completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    data: Value,
    response: ResponseMeta,
}

impl Resource {
    /// Wraps an attribute payload together with its response metadata.
    #[must_use]
    pub fn new(data: Value, response: ResponseMeta) -> Self {
        Self { data, response }
    }

    /// Builds a resource from a pre-embedded payload (for example the initial
    /// state injected by server-side rendering). The synthetic response is a
    /// plain 200.
    #[must_use]
    pub fn from_embedded(data: Value) -> Self {
        Self::new(data, ResponseMeta::ok())
    }

    /// The transport metadata of the response this resource came from.
    #[must_use]
    pub fn response(&self) -> &ResponseMeta {
        &self.response
    }

    /// The raw attribute payload.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.data
    }

    /// Returns the value at a dotted path, or `default` if the path does not
    /// resolve.
    #[must_use]
    pub fn get(&self, path: &str, default: Value) -> Value {
        lookup(&self.data, path).cloned().unwrap_or(default)
    }

    /// Returns the string at a dotted path, or `default` if the path does not
    /// resolve to a string.
    #[must_use]
    pub fn get_str(&self, path: &str, default: &str) -> String {
        lookup(&self.data, path)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Returns the integer at a dotted path, or `default`.
    #[must_use]
    pub fn get_i64(&self, path: &str, default: i64) -> i64 {
        lookup(&self.data, path).and_then(Value::as_i64).unwrap_or(default)
    }

    /// Returns the boolean at a dotted path, or `default`.
    #[must_use]
    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        lookup(&self.data, path).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Deserializes the value at a dotted path into `T`, or returns `None`.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        lookup(&self.data, path).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Returns true if the dotted path resolves to any value.
    #[must_use]
    pub fn has(&self, path: &str) -> bool {
        lookup(&self.data, path).is_some()
    }
}

/// A deserialized list of server entities sharing one response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    items: Vec<Value>,
    response: ResponseMeta,
}

impl Collection {
    /// Wraps a list payload together with its response metadata.
    #[must_use]
    pub fn new(items: Vec<Value>, response: ResponseMeta) -> Self {
        Self { items, response }
    }

    /// The transport metadata of the response this collection came from.
    #[must_use]
    pub fn response(&self) -> &ResponseMeta {
        &self.response
    }

    /// Number of entities in the collection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the collection holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates the entities as read-only [`Resource`] views sharing the
    /// collection's response metadata.
    pub fn iter(&self) -> impl Iterator<Item = Resource> + '_ {
        self.items
            .iter()
            .map(|item| Resource::new(item.clone(), self.response.clone()))
    }
}

/// Resolves a dotted path against a JSON value.
///
/// Path segments index objects by key and arrays by decimal position. An
/// empty path resolves to the value itself.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
