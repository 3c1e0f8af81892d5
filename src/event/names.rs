//! Canonical event and hook names.
//!
//! Events (`EVENT_*`) are fire-and-forget notifications; hooks (`HOOK_*`) are
//! sequential mutation-passing pipelines whose payload is threaded through
//! every listener and returned to the caller.

/// Hook executed before the app context object is created.
pub const HOOK_BEFORE_CONTEXT_CREATE: &str = "framework:beforeContextCreate";

/// Hook to filter the app context right after it was created.
pub const HOOK_CONTEXT_FILTER: &str = "framework:contextFilter";

/// Hook to filter the router configuration before the router is installed.
pub const HOOK_ROUTER_CONFIG_FILTER: &str = "framework:routerConfigFilter";

/// Hook to filter the UI configuration before renderer instances are created.
pub const HOOK_UI_CONFIG_FILTER: &str = "framework:uiConfigFilter";

/// Hook emitted once the context graph is fully composed, on both sides.
pub const HOOK_INIT: &str = "framework:init";

/// Same as [`HOOK_INIT`], but only on the client side.
pub const HOOK_INIT_CLIENT: &str = "framework:init:client";

/// Same as [`HOOK_INIT`], but only on the server side.
pub const HOOK_INIT_SERVER: &str = "framework:init:server";

/// Emitted before a navigation occurs.
pub const EVENT_ROUTE_BEFORE_NAVIGATION: &str = "framework:routeBeforeNavigation";

/// Hook to modify the API query when a new route was requested.
pub const HOOK_ROUTE_QUERY_FILTER: &str = "framework:routeQueryFilter";

/// Hook to modify the fetched state before it reaches the page context.
pub const HOOK_ROUTE_STATE_PRE_PROCESSOR: &str = "framework:routeState:preProcess";

/// Internal hook on which framework services apply their post-navigation
/// updates. The page context commit and every ancillary repository hang off
/// this hook.
pub const HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION: &str = "framework:routeState:updateInternal";

/// Hook for post-navigation handlers once the page context was updated.
pub const HOOK_ROUTE_STATE_POST_PROCESSOR: &str = "framework:routeState:postProcess";

/// Emitted after a navigation was executed and committed.
pub const EVENT_ROUTE_AFTER_NAVIGATION: &str = "framework:routeAfterNavigation";

/// Hook emitted when a content element definition is resolved.
pub const HOOK_CONTENT_ELEMENT_DEFINITION_FILTER: &str = "framework:contentElement:filterDefinition";

/// Emitted as soon as a content element reached the rendered ready state.
pub const EVENT_CONTENT_ELEMENT_LOADED: &str = "framework:contentElement:loaded";

/// Hook emitted inside the error handler; payload differs per app mode.
pub const HOOK_ON_ERROR: &str = "framework:onError";

/// Emitted whenever the active locale changes.
pub const EVENT_LANGUAGE_CHANGED: &str = "framework:languageChanged";
