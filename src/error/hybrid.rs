//! Concrete error handling for the hybrid mode.
//!
//! Hybrid widgets never own navigation, so handling reduces to the on-error
//! hook plus flagging the failed content element; everything else (console,
//! logger) is done by the central handler.

use std::sync::Arc;

use serde_json::json;

use crate::context::AppContext;
use crate::error::spa::{describe, mark_element_failed};
use crate::error::{AppErrorType, ConcreteErrorHandler, HandlerContext};
use crate::event::names::HOOK_ON_ERROR;
use crate::event::HookPayload;

/// Builds the hybrid handling strategy bound to one application context.
#[must_use]
pub fn hybrid_error_handler(app: AppContext) -> ConcreteErrorHandler {
    Arc::new(move |ctx| {
        let app = app.clone();
        Box::pin(async move { handle(app, ctx).await })
    })
}

async fn handle(app: AppContext, mut ctx: HandlerContext) -> HandlerContext {
    let error = ctx.error.clone();

    let payload = HookPayload::new()
        .with("error", describe(&error))
        .with("ignore", json!(ctx.flags.ignore))
        .with("printToConsole", json!(ctx.flags.print_to_console))
        .with("sendToLogger", json!(ctx.flags.send_to_logger));
    let payload = match app.bus().emit_hook(HOOK_ON_ERROR, payload).await {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "on-error hook failed, continuing unfiltered");
            HookPayload::new()
                .with("printToConsole", json!(ctx.flags.print_to_console))
                .with("sendToLogger", json!(ctx.flags.send_to_logger))
        }
    };
    ctx.flags.ignore = payload.flag("ignore");
    ctx.flags.print_to_console = payload.flag("printToConsole");
    ctx.flags.send_to_logger = payload.flag("sendToLogger");

    if ctx.flags.ignore {
        return ctx;
    }

    if error.error_type() == AppErrorType::ContentElement {
        if let Some(element_id) = error.element_id() {
            mark_element_failed(&app.store(), &element_id);
        }
    }

    ctx
}
