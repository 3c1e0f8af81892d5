//! Application configuration.
//!
//! One [`AppConfig`] value describes a whole application instance: API
//! endpoints, error routing, router behavior, UI component registry and the
//! hybrid content-element markers. The config is serializable so filter hooks
//! can rewrite it as JSON; fields that carry callbacks are skipped during
//! serialization and grafted back afterwards (see
//! [`AppConfig::restore_callbacks`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::event::Listener;
use crate::modules::meta::PageMetaInfo;
use crate::render::ComponentRef;

/// Which flavor of application is being bootstrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    /// Full single-page application owning the whole document.
    Spa,
    /// Isolated widgets hydrated into server-rendered markup.
    Hybrid,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

/// Where the code is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionSide {
    Client,
    Server,
}

/// Callback invoked for errors that should reach an external logger.
pub type ErrorLogger = Arc<dyn Fn(&AppError) + Send + Sync>;

/// Resolves the redirect target for a matched error route from the error
/// itself, e.g. to build a path containing the error code.
pub type ErrorRouteResolver = Arc<dyn Fn(&AppError) -> String + Send + Sync>;

/// API endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiConfig {
    /// Absolute base URL of the backend.
    pub base_url: Option<String>,

    /// Base URL override used in the development environment.
    pub dev_base_url: Option<String>,

    /// First path segment under the base URL.
    pub root_uri_part: String,

    /// Path segment under which addressable resources live.
    pub resource_base_uri_part: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            dev_base_url: None,
            root_uri_part: "api".to_string(),
            resource_base_uri_part: "resources".to_string(),
        }
    }
}

/// One error route: errors with a matching code get redirected to a
/// dedicated page instead of rendering the inline error component.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErrorRoute {
    /// The error code this route matches.
    pub code: u16,

    /// Static redirect target. Overridden by `resolver` when present.
    pub path: String,

    /// Dynamic target resolver, taking precedence over `path`.
    #[serde(skip)]
    pub resolver: Option<ErrorRouteResolver>,

    /// Whether matched errors are still printed to the console.
    pub print_to_console: bool,

    /// Whether matched errors are still forwarded to the logger callback.
    pub send_to_logger: bool,
}

impl Default for ErrorRoute {
    fn default() -> Self {
        Self {
            code: 0,
            path: String::new(),
            resolver: None,
            print_to_console: true,
            send_to_logger: true,
        }
    }
}

impl ErrorRoute {
    /// The redirect target for a concrete error.
    #[must_use]
    pub fn target_for(&self, error: &AppError) -> String {
        match &self.resolver {
            Some(resolver) => resolver(error),
            None => self.path.clone(),
        }
    }
}

impl std::fmt::Debug for ErrorRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorRoute")
            .field("code", &self.code)
            .field("path", &self.path)
            .field("has_resolver", &self.resolver.is_some())
            .field("print_to_console", &self.print_to_console)
            .field("send_to_logger", &self.send_to_logger)
            .finish()
    }
}

/// Error-handling configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErrorConfig {
    /// Code assigned to errors whose reason carries none.
    pub default_error_code: u16,

    /// Whether handled errors are printed via the tracing console layer.
    pub print_to_console: bool,

    /// Whether the bootstrap should register a process/window-global handler.
    pub register_global_handler: bool,

    /// Error routes matched by code, first match wins.
    pub routes: Vec<ErrorRoute>,

    /// External logger callback.
    #[serde(skip)]
    pub logger: Option<ErrorLogger>,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            default_error_code: 500,
            print_to_console: true,
            register_global_handler: true,
            routes: Vec::new(),
            logger: None,
        }
    }
}

impl ErrorConfig {
    /// First error route matching the given code.
    #[must_use]
    pub fn route_for(&self, code: u16) -> Option<&ErrorRoute> {
        self.routes.iter().find(|route| route.code == code)
    }
}

impl std::fmt::Debug for ErrorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorConfig")
            .field("default_error_code", &self.default_error_code)
            .field("print_to_console", &self.print_to_console)
            .field("register_global_handler", &self.register_global_handler)
            .field("routes", &self.routes)
            .field("has_logger", &self.logger.is_some())
            .finish()
    }
}

/// Router configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterConfig {
    /// Path prefix the host router serves the application under.
    pub base_path: Option<String>,

    /// Common-element keys re-requested on every subsequent navigation.
    pub refresh_common_elements: Vec<String>,
}

/// UI component registry and mount configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiConfig {
    /// Selector of the SPA mount element.
    pub mount_point: String,

    /// The outermost application component.
    pub app_component: Option<ComponentRef>,

    /// Component rendered in place of the page on unroutable errors.
    pub error_component: Option<ComponentRef>,

    /// Component rendered before the first navigation has settled.
    pub preload_component: Option<ComponentRef>,

    /// Marker component shown when the page is a CMS preview.
    pub preview_marker_component: Option<ComponentRef>,

    /// Placeholder installed as component override while a server-side
    /// redirect response is being written.
    pub redirect_placeholder_component: Option<ComponentRef>,

    /// Page layout components by layout key. A `"default"` entry is
    /// guaranteed by the bootstrap.
    pub layout_components: BTreeMap<String, ComponentRef>,

    /// Metadata present regardless of the current page.
    pub static_meta: PageMetaInfo,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            mount_point: "#app".to_string(),
            app_component: None,
            error_component: None,
            preload_component: None,
            preview_marker_component: None,
            redirect_placeholder_component: None,
            layout_components: BTreeMap::new(),
            static_meta: PageMetaInfo::default(),
        }
    }
}

/// Hybrid content-element discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentElementConfig {
    /// Selector matching widget mount points in server-rendered markup.
    pub selector: String,

    /// Attribute holding the inline JSON widget definition.
    pub definition_attribute: String,
}

impl Default for ContentElementConfig {
    fn default() -> Self {
        Self {
            selector: "[data-content-element]".to_string(),
            definition_attribute: "data-content-element".to_string(),
        }
    }
}

/// Translation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TranslationConfig {
    /// Locale assumed before any page state arrived.
    pub initial_locale: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            initial_locale: "en".to_string(),
        }
    }
}

/// An event listener bound during bootstrap, before any hook fires.
#[derive(Clone)]
pub struct EventBinding {
    /// Event or hook name to bind to.
    pub event: String,

    /// The listener itself.
    pub listener: Listener,
}

impl std::fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBinding")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// The complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Environment override. Resolved from the process environment when
    /// absent.
    pub environment: Option<Environment>,

    /// Execution side override. Resolved from the process environment when
    /// absent.
    pub execution_side: Option<ExecutionSide>,

    pub api: ApiConfig,
    pub error_handling: ErrorConfig,
    pub router: RouterConfig,
    pub ui: UiConfig,
    pub content_elements: ContentElementConfig,
    pub translation: TranslationConfig,

    /// Initial reactive store contents.
    pub initial_store: Map<String, Value>,

    /// Page state embedded by the server for the first client-side
    /// navigation, so the client does not re-fetch what was just rendered.
    pub initial_state: Option<Value>,

    /// Tracing filter directive, e.g. `"pagebridge=debug"`.
    pub trace_level: Option<String>,

    /// Listeners bound before the first bootstrap hook fires.
    #[serde(skip)]
    pub events: Vec<EventBinding>,
}

impl AppConfig {
    /// Copies the non-serializable callback fields from `original` back onto
    /// a config that went through a JSON filter hook. Error-route resolvers
    /// are matched by code.
    pub fn restore_callbacks(&mut self, original: &AppConfig) {
        self.error_handling.logger = original.error_handling.logger.clone();
        for route in &mut self.error_handling.routes {
            if route.resolver.is_none() {
                route.resolver = original
                    .error_handling
                    .routes
                    .iter()
                    .find(|orig| orig.code == route.code)
                    .and_then(|orig| orig.resolver.clone());
            }
        }
        self.events = original.events.clone();
    }
}
