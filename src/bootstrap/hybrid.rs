//! The hybrid boot sequence.
//!
//! Hybrid mode hydrates isolated widgets into server-rendered markup: global
//! data injected by the server is loaded, translations are installed from
//! it, and then every content-element mount point in the document gets its
//! own derived context and renderer instance. A failing widget is reported
//! through its content-element error scope and never takes its siblings
//! down.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::config::{AppConfig, AppMode, ContentElementConfig};
use crate::context::AppContext;
use crate::domain::{BridgeError, Result};
use crate::error::hybrid_error_handler;
use crate::event::names::{EVENT_CONTENT_ELEMENT_LOADED, HOOK_CONTENT_ELEMENT_DEFINITION_FILTER};
use crate::event::HookPayload;
use crate::render::{ComponentRef, ElementHandle, RenderNode, Renderer};

use super::basic::{apply_context_filter, emit_init_hooks, make_app_context, HostBindings};
use super::FrameworkRuntime;

/// Component a widget mounts when the host configures no app component.
const CONTENT_ELEMENT_COMPONENT: &str = "content-element";

/// Boots a hybrid application. Returns the parent context and one derived
/// child context per discovered widget, including the ones whose mount
/// failed.
pub async fn boot_hybrid(
    runtime: &FrameworkRuntime,
    config: AppConfig,
    bindings: HostBindings,
) -> Result<(AppContext, Vec<AppContext>)> {
    let app = make_app_context(runtime, AppMode::Hybrid, config, &bindings).await?;
    app.error_handler()
        .set_concrete_handler(hybrid_error_handler(app.clone()));
    apply_context_filter(&app).await?;
    load_global_data(&app, &bindings);
    register_translation_from_global_data(&app).await?;
    emit_init_hooks(&app).await?;
    let children = make_widget_apps(&app, &bindings).await?;
    Ok((app, children))
}

/// Moves the server-injected global data into the render context.
pub fn load_global_data(app: &AppContext, bindings: &HostBindings) {
    if let Some(data) = &bindings.global_data {
        app.render_context().set_global_data(data.clone());
    }
}

/// Installs and activates the translation catalogue embedded in the global
/// data, when one is present.
pub async fn register_translation_from_global_data(app: &AppContext) -> Result<()> {
    let global = app.render_context().global_data();
    let Some(catalogue) = global.get("translations") else {
        return Ok(());
    };
    let translation = app.translation();
    translation.install_catalogue_value(catalogue)?;
    if let Some(id) = catalogue.get("id").and_then(Value::as_str) {
        translation.set_locale(id).await?;
    }
    Ok(())
}

/// Discovers all widget mount points and mounts one isolated application
/// per element.
pub async fn make_widget_apps(
    app: &AppContext,
    bindings: &HostBindings,
) -> Result<Vec<AppContext>> {
    let Some(document) = &bindings.document else {
        return Err(BridgeError::Bootstrap(
            "hybrid bootstrap requires a markup document".into(),
        ));
    };
    let Some(renderer) = &bindings.renderer else {
        return Err(BridgeError::Bootstrap(
            "hybrid bootstrap requires a renderer".into(),
        ));
    };

    let config = app.config().content_elements;
    let elements = document.select(&config.selector);
    tracing::debug!(
        selector = %config.selector,
        count = elements.len(),
        "mounting content elements"
    );

    let mut children = Vec::with_capacity(elements.len());
    for element in elements {
        let child = app.derive_child();
        if let Err(err) = mount_widget(&child, renderer.as_ref(), &element, &config).await {
            tracing::warn!(element = %element.id, error = %err, "content element failed to mount");
            let definition = element
                .attribute(&config.definition_attribute)
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or(Value::Null);
            let scope = app
                .error_handler()
                .content_element_scope(&element.id, definition);
            if let Err(report_err) = scope.report(err).await {
                tracing::error!(error = %report_err, "content element error reporting failed");
            }
        }
        children.push(child);
    }
    Ok(children)
}

async fn mount_widget(
    child: &AppContext,
    renderer: &dyn Renderer,
    element: &ElementHandle,
    config: &ContentElementConfig,
) -> Result<()> {
    let raw = element.attribute(&config.definition_attribute).ok_or_else(|| {
        BridgeError::Config(format!(
            "element {} carries no {} attribute",
            element.id, config.definition_attribute
        ))
    })?;
    let parsed: Value = serde_json::from_str(raw).map_err(|err| {
        BridgeError::Config(format!(
            "element {} carries an invalid definition: {err}",
            element.id
        ))
    })?;
    let definition = flatten_definition(&parsed);

    let payload = HookPayload::new()
        .with("definition", definition)
        .with("elementId", json!(element.id));
    let payload = child
        .bus()
        .emit_hook(HOOK_CONTENT_ELEMENT_DEFINITION_FILTER, payload)
        .await?;
    let definition = payload.get("definition").cloned().unwrap_or(Value::Null);

    let component = child
        .config()
        .ui
        .app_component
        .unwrap_or_else(|| ComponentRef::new(CONTENT_ELEMENT_COMPONENT));
    let node = RenderNode::new(component).with_prop("definition", definition);
    renderer.mount(&node, &element.id)?;

    child
        .bus()
        .emit(
            EVENT_CONTENT_ELEMENT_LOADED,
            HookPayload::new().with("elementId", json!(element.id)),
        )
        .await;
    Ok(())
}

/// Normalizes an inline widget definition: JSON:API-shaped definitions
/// (`data.id` / `data.attributes`) are flattened into one object, anything
/// else passes through untouched.
fn flatten_definition(parsed: &Value) -> Value {
    let Some(data) = parsed.get("data") else {
        return parsed.clone();
    };
    let mut flat: Map<String, Value> = data
        .get("attributes")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    if let Some(id) = data.get("id") {
        flat.insert("id".to_string(), id.clone());
    }
    Value::Object(flat)
}
