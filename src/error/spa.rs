//! Concrete error handling for the SPA mode.
//!
//! Matches errors against the configured error routes, detects redirect
//! loops against the recent navigation history, runs the on-error hook and
//! then either redirects or installs the inline error component. On the
//! server the response additionally gets no-cache headers and the error
//! status.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::context::AppContext;
use crate::error::{AppError, AppErrorType, ConcreteErrorHandler, HandlerContext};
use crate::event::names::HOOK_ON_ERROR;
use crate::event::HookPayload;
use crate::store::keys::{APP_ERROR_COMPONENT, APP_FAILED_CONTENT_ELEMENTS};
use crate::store::Store;

/// Builds the SPA handling strategy bound to one application context.
#[must_use]
pub fn spa_error_handler(app: AppContext) -> ConcreteErrorHandler {
    Arc::new(move |ctx| {
        let app = app.clone();
        Box::pin(async move { handle(app, ctx).await })
    })
}

async fn handle(app: AppContext, mut ctx: HandlerContext) -> HandlerContext {
    let error = ctx.error.clone();
    let error_route = ctx.config.route_for(error.code()).cloned();
    let is_content_element = error.error_type() == AppErrorType::ContentElement;

    if let Some(route) = &error_route {
        ctx.flags.print_to_console = route.print_to_console;
        ctx.flags.send_to_logger = route.send_to_logger;
    }

    // Content-element errors never leave the page they happened on.
    let mut redirect = error_route
        .as_ref()
        .filter(|_| !is_content_element)
        .map(|route| route.target_for(&error));

    if let Some(target) = &redirect {
        let recent = app.error_handler().recent_navigations(2);
        if recent.iter().any(|path| path == target) {
            tracing::warn!(target, "error redirect loops back into itself");
            if recent.iter().any(|path| path == "/") {
                // Root already failed too, render inline instead of bouncing.
                redirect = None;
            } else {
                redirect = Some("/".to_string());
            }
        }
    }

    let payload = HookPayload::new()
        .with("error", describe(&error))
        .with_json("errorRoute", &error_route)
        .with_json("redirect", &redirect)
        .with("ignore", json!(ctx.flags.ignore))
        .with("printToConsole", json!(ctx.flags.print_to_console))
        .with("sendToLogger", json!(ctx.flags.send_to_logger));
    let payload = match app.bus().emit_hook(HOOK_ON_ERROR, payload).await {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "on-error hook failed, continuing unfiltered");
            HookPayload::new()
                .with("ignore", json!(ctx.flags.ignore))
                .with("printToConsole", json!(ctx.flags.print_to_console))
                .with("sendToLogger", json!(ctx.flags.send_to_logger))
                .with_json("redirect", &redirect)
        }
    };
    ctx.flags.ignore = payload.flag("ignore");
    ctx.flags.print_to_console = payload.flag("printToConsole");
    ctx.flags.send_to_logger = payload.flag("sendToLogger");
    redirect = payload.get_as("redirect");

    if ctx.flags.ignore {
        return ctx;
    }

    if is_content_element {
        if let Some(element_id) = error.element_id() {
            mark_element_failed(&app.store(), &element_id);
        }
    }

    app.render_context().set_status(error.code());

    match redirect {
        Some(target) => {
            // A pending navigation reads routerNextValue back instead of a
            // second router call.
            if error.payload_value("routerNextValue").is_some() {
                error.add_payload("routerNextValue", json!(target));
            } else {
                replace_route(&app, &target).await;
            }
        }
        None => {
            if let Some(component) = app.config().ui.error_component {
                app.store().set(
                    APP_ERROR_COMPONENT,
                    json!({ "component": component, "error": describe(&error) }),
                );
            } else {
                app.store()
                    .set(APP_ERROR_COMPONENT, json!({ "error": describe(&error) }));
            }
        }
    }

    if app.is_server() {
        apply_error_response(&app, error.code());
    }

    ctx
}

async fn replace_route(app: &AppContext, target: &str) {
    let router = app
        .page_context()
        .ok()
        .and_then(|page| page.router());
    match router {
        Some(router) => {
            if let Err(err) = router.replace(target).await {
                tracing::warn!(target, error = %err, "error redirect navigation failed");
            }
        }
        None => tracing::warn!(target, "no router installed, cannot redirect on error"),
    }
}

fn apply_error_response(app: &AppContext, code: u16) {
    let Some(response) = app.render_context().server_response() else {
        return;
    };
    if response.headers_sent() {
        tracing::debug!("response head already flushed, skipping error headers");
        return;
    }
    response.set_header("Expires", "0");
    response.set_header("Cache-Control", "no-cache, no-store, must-revalidate");
    response.set_header("Pragma", "no-cache");
    response.set_status(code);
}

/// Marks a content element as failed in the reactive store, so the renderer
/// swaps that element for its error placeholder.
pub(crate) fn mark_element_failed(store: &Store, element_id: &str) {
    let mut failed = store
        .get(APP_FAILED_CONTENT_ELEMENTS, json!({}))
        .as_object()
        .cloned()
        .unwrap_or_default();
    failed.insert(element_id.to_string(), json!(true));
    store.set(APP_FAILED_CONTENT_ELEMENTS, Value::Object(failed));
}

/// Serializable projection of an error for hook payloads and error props.
pub(crate) fn describe(error: &AppError) -> Value {
    json!({
        "type": error.error_type(),
        "code": error.code(),
        "message": error.message(),
        "payload": error.additional_payload(),
        "occurredAt": error.occurred_at().to_rfc3339(),
    })
}
