//! The SPA boot sequence.
//!
//! Composes the shared steps with the SPA-specific ones: page context,
//! router installation, UI config filtering, page metadata and finally the
//! mount. The order is fixed; every step is observable through its hook.

use std::sync::Arc;

use serde_json::json;

use crate::config::{AppConfig, AppMode, RouterConfig, UiConfig};
use crate::context::{AppContext, PageContext, DEFAULT_LAYOUT};
use crate::domain::{BridgeError, Result, Route};
use crate::error::spa_error_handler;
use crate::event::names::{HOOK_ROUTER_CONFIG_FILTER, HOOK_UI_CONFIG_FILTER};
use crate::event::HookPayload;
use crate::modules::PageMeta;
use crate::render::{ComponentRef, RenderNode};
use crate::routing::RouteHandler;
use crate::store::keys::{
    APP_COMPONENT_OVERRIDE, APP_ERROR_COMPONENT, APP_HAS_CONTENT,
};

use super::basic::{
    apply_context_filter, emit_init_hooks, make_app_context, resolve_api_endpoints, HostBindings,
};
use super::FrameworkRuntime;

/// Layout component registered when the host configures none.
const FALLBACK_LAYOUT_COMPONENT: &str = "page-layout-default";

/// Boots a full single-page application and returns its context together
/// with the route handler the host router drives.
pub async fn boot_spa(
    runtime: &FrameworkRuntime,
    config: AppConfig,
    bindings: HostBindings,
) -> Result<(AppContext, Arc<RouteHandler>)> {
    let app = make_app_context(runtime, AppMode::Spa, config, &bindings).await?;
    register_concrete_error_handler(&app);
    register_page_context(&app)?;
    apply_context_filter(&app).await?;
    register_router(&app, &bindings).await?;
    apply_ui_config_filter(&app).await?;
    register_page_meta(&app, &bindings);
    emit_init_hooks(&app).await?;

    let route_handler = Arc::new(RouteHandler::new(app.clone()));
    mount(&app, &route_handler, &bindings).await?;
    Ok((app, route_handler))
}

pub fn register_concrete_error_handler(app: &AppContext) {
    app.error_handler()
        .set_concrete_handler(spa_error_handler(app.clone()));
}

/// Creates the page context with the resolved site URL and the configured
/// layout registry.
pub fn register_page_context(app: &AppContext) -> Result<()> {
    let config = app.config();
    let endpoints = resolve_api_endpoints(&config, app.environment())?;

    let mut layouts = config.ui.layout_components.clone();
    layouts
        .entry(DEFAULT_LAYOUT.to_string())
        .or_insert_with(|| ComponentRef::new(FALLBACK_LAYOUT_COMPONENT));

    let page = PageContext::new(
        app.store(),
        &app.bus(),
        app.resource_client(),
        endpoints.base.as_str().trim_end_matches('/'),
        layouts,
    );
    app.install_page_context(page);
    Ok(())
}

/// Filters the router configuration and installs the host router.
pub async fn register_router(app: &AppContext, bindings: &HostBindings) -> Result<()> {
    let payload = HookPayload::new().with_json("router", &app.config().router);
    let filtered = app
        .bus()
        .emit_hook(HOOK_ROUTER_CONFIG_FILTER, payload)
        .await?;
    if let Some(router_config) = filtered.get_as::<RouterConfig>("router") {
        app.update_config(|config| config.router = router_config);
    }

    if let Some(router) = &bindings.router {
        app.page_context()?.install_router(Arc::clone(router));
    }
    Ok(())
}

/// Filters the UI configuration before any render tree is composed.
pub async fn apply_ui_config_filter(app: &AppContext) -> Result<()> {
    let payload = HookPayload::new().with_json("ui", &app.config().ui);
    let filtered = app.bus().emit_hook(HOOK_UI_CONFIG_FILTER, payload).await?;
    if let Some(ui) = filtered.get_as::<UiConfig>("ui") {
        app.update_config(|config| config.ui = ui);
    }
    Ok(())
}

/// Creates the page metadata service and hooks it into the navigation flow.
pub fn register_page_meta(app: &AppContext, bindings: &HostBindings) {
    let meta = PageMeta::new(app.config().ui.static_meta.clone());
    meta.bind(&app.bus());
    if let Some(sink) = &bindings.meta_sink {
        meta.install_sink(Arc::clone(sink));
    }
    if let Ok(page) = app.page_context() {
        page.install_page_meta(meta);
    }
}

/// Composes the outer shell: override slot, error slot, preload gate, then
/// the configured app component (with the preview marker when applicable).
pub fn compose_shell(app: &AppContext) -> Result<RenderNode> {
    let store = app.store();
    let ui = app.config().ui;

    let override_slot = store.get(APP_COMPONENT_OVERRIDE, json!(null));
    if let Some(component) = override_slot.get("component") {
        let component: ComponentRef = serde_json::from_value(component.clone())?;
        return Ok(RenderNode::new(component));
    }

    let error_slot = store.get(APP_ERROR_COMPONENT, json!(null));
    if !error_slot.is_null() {
        let component = error_slot
            .get("component")
            .cloned()
            .map(serde_json::from_value::<ComponentRef>)
            .transpose()?
            .unwrap_or_else(|| ComponentRef::new("framework-error"));
        let mut node = RenderNode::new(component);
        if let Some(error) = error_slot.get("error") {
            node = node.with_prop("error", error.clone());
        }
        return Ok(node);
    }

    if !store.get_bool(APP_HAS_CONTENT, false) {
        let preload = ui
            .preload_component
            .unwrap_or_else(|| ComponentRef::new("preload-indicator"));
        return Ok(RenderNode::new(preload));
    }

    let app_component = ui
        .app_component
        .ok_or_else(|| BridgeError::Config("ui.appComponent is not configured".into()))?;
    let mut node = RenderNode::new(app_component);
    if let Ok(page) = app.page_context() {
        if page.is_preview() {
            if let Some(marker) = ui.preview_marker_component {
                node.children.push(RenderNode::new(marker));
            }
        }
    }
    Ok(node)
}

/// Mounts the application: on the client through the renderer, on the server
/// by handling the requested URL directly and draining error handling before
/// the host serializes the response.
///
/// The server path must not go through the host router; the route handler
/// serving this request does not exist from the router's point of view until
/// the boot returns it.
pub async fn mount(
    app: &AppContext,
    routes: &Arc<RouteHandler>,
    bindings: &HostBindings,
) -> Result<()> {
    if app.is_server() {
        let Some(url) = app.render_context().request_url() else {
            return Err(BridgeError::Bootstrap(
                "server bootstrap requires a request url".into(),
            ));
        };
        if let Err(err) = routes.handle(Route::new(url.clone()), None).await {
            tracing::warn!(url, error = %err, "initial navigation failed, serving root");
            if let Err(err) = routes.handle(Route::root(), None).await {
                tracing::error!(error = %err, "root navigation failed as well");
            }
        }
        app.error_handler().wait_for_all().await;
        return Ok(());
    }

    let Some(renderer) = &bindings.renderer else {
        return Err(BridgeError::Bootstrap(
            "client bootstrap requires a renderer".into(),
        ));
    };
    let shell = compose_shell(app)?;
    renderer.mount(&shell, &app.config().ui.mount_point)
}
