//! Canonical store keys used by the framework itself.
//!
//! These keys form the de facto persisted-state layout of a session. Each key
//! updates independently; there is no cross-key transactionality, so readers
//! must tolerate transiently inconsistent combinations during a navigation.

/// Raw resource state of the currently served page.
pub const PAGE_STATE: &str = "framework:page:state";

/// Derived `data` view of the current page resource.
pub const PAGE_DATA: &str = "framework:page:data";

/// Map of loaded common elements, keyed by element id.
pub const PAGE_COMMON_ELEMENTS: &str = "framework:page:common";

/// Pid configuration provided by the backend with every page response.
pub const PAGE_PID_CONFIGURATION: &str = "framework:page:pid";

/// The currently active route (SPA mode only).
pub const PAGE_ROUTE: &str = "framework:page:route";

/// Links the backend registered for the current page.
pub const PAGE_LINKS: &str = "framework:page:links";

/// The site base URL of the current page.
pub const PAGE_SITE_URL: &str = "framework:page:siteUrl";

/// Gate that keeps the outer shell from rendering the app before the first
/// navigation has settled.
pub const APP_HAS_CONTENT: &str = "framework:app:hasContent";

/// Overrides the configured app component (used by the server-side redirect
/// placeholder).
pub const APP_COMPONENT_OVERRIDE: &str = "framework:app:componentOverride";

/// The inline error component the shell should render instead of the app.
pub const APP_ERROR_COMPONENT: &str = "framework:app:errorComponent";

/// Map of content elements flagged as failed, keyed by element id.
pub const APP_FAILED_CONTENT_ELEMENTS: &str = "framework:app:failedContentElements";
