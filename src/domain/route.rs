//! Route value type shared by the router seam and the navigation core.

use serde::{Deserialize, Serialize};

/// A single routable location.
///
/// `path` is the slug handed to the backend page endpoint; `full_path`
/// additionally carries the query string and is what feeds the navigation
/// stack and loop detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Path portion of the location, always with a leading slash.
    pub path: String,

    /// Full location including the query string.
    pub full_path: String,
}

impl Route {
    /// Creates a route where path and full path are identical.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            full_path: path.clone(),
            path,
        }
    }

    /// Creates a route with a distinct full path (query string and the like).
    #[must_use]
    pub fn with_full_path(path: impl Into<String>, full_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            full_path: full_path.into(),
        }
    }

    /// The site root.
    #[must_use]
    pub fn root() -> Self {
        Self::new("/")
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_path)
    }
}
