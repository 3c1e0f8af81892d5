//! The navigation core.
//!
//! Every route change runs through [`RouteHandler::handle`]: hooks fire in a
//! fixed order, the page state is fetched (or taken from the embedded
//! initial state), special 203 responses short-circuit into redirects, and
//! the result is committed through the internal after-navigation hook. The
//! handler returns an explicit [`NavigationDecision`] instead of driving the
//! host router itself.
//!
//! Overlapping navigations are serialized by sequence number: each call
//! claims the next sequence up front and only the call holding the latest
//! sequence may commit. A superseded navigation finishes its fetch but
//! discards the result and reports `Abort`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use futures_util::future::BoxFuture;
use serde_json::{json, Value};

use crate::context::AppContext;
use crate::domain::{BridgeError, Resource, Result, Route};
use crate::event::names::{
    EVENT_ROUTE_AFTER_NAVIGATION, EVENT_ROUTE_BEFORE_NAVIGATION, HOOK_ROUTE_QUERY_FILTER,
    HOOK_ROUTE_STATE_POST_PROCESSOR, HOOK_ROUTE_STATE_PRE_PROCESSOR,
    HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION,
};
use crate::event::HookPayload;
use crate::store::keys::{APP_COMPONENT_OVERRIDE, APP_HAS_CONTENT};

use super::query::build_page_query;

/// Status the backend uses for out-of-band instructions.
const SPECIAL_RESPONSE_STATUS: u16 = 203;

/// Redirect code assumed when the instruction names none.
const DEFAULT_REDIRECT_CODE: i64 = 301;

/// What the host router should do with the navigation it asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Let the navigation through.
    Proceed,
    /// Cancel the navigation, leaving the current page in place.
    Abort,
    /// Navigate somewhere else instead.
    RedirectTo(String),
}

/// Phases a navigation passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationStage {
    /// No navigation has run yet.
    Idle,
    /// Hooks before the fetch are running.
    Preparing,
    /// The page state request is in flight.
    Fetching,
    /// A 203 instruction is being executed.
    SpecialResponse,
    /// The fetched state is being committed.
    Committing,
    /// The last navigation finished.
    Settled,
    /// The last navigation failed and went through error handling.
    Failed,
}

/// Whether a navigation may move from `from` to `to`.
#[must_use]
pub fn is_valid_transition(from: NavigationStage, to: NavigationStage) -> bool {
    use NavigationStage::{Committing, Failed, Fetching, Idle, Preparing, Settled, SpecialResponse};
    matches!(
        (from, to),
        (Idle | Settled | Failed, Preparing)
            | (Preparing, Fetching)
            // The embedded initial state skips the fetch.
            | (Preparing, Committing)
            | (Fetching, SpecialResponse | Committing | Failed)
            | (Preparing, Failed)
            | (SpecialResponse, Settled | Failed)
            | (Committing, Settled | Failed)
    )
}

pub struct RouteHandler {
    app: AppContext,
    initial_request: AtomicBool,
    nav_seq: AtomicU64,
    // Sequence and stage of the most recent navigation observable from
    // outside; superseded calls keep their own tracker.
    stage: Mutex<(u64, NavigationStage)>,
}

/// Stage bookkeeping for one `handle` call.
///
/// Every navigation tracks its own progression; the shared observable stage
/// only follows the call holding the latest sequence, so a superseded
/// navigation never stomps the stage of the one that won.
struct StageTracker<'a> {
    handler: &'a RouteHandler,
    seq: u64,
    current: NavigationStage,
}

impl StageTracker<'_> {
    fn advance(&mut self, next: NavigationStage) {
        if !is_valid_transition(self.current, next) && self.current != next {
            tracing::warn!(
                seq = self.seq,
                from = ?self.current,
                to = ?next,
                "unexpected navigation stage transition"
            );
        }
        tracing::trace!(seq = self.seq, from = ?self.current, to = ?next, "navigation stage");
        self.current = next;
        let mut shared = self
            .handler
            .stage
            .lock()
            .expect("route handler lock poisoned");
        if self.seq >= shared.0 {
            *shared = (self.seq, next);
        }
    }
}

impl RouteHandler {
    #[must_use]
    pub fn new(app: AppContext) -> Self {
        Self {
            app,
            initial_request: AtomicBool::new(true),
            nav_seq: AtomicU64::new(0),
            stage: Mutex::new((0, NavigationStage::Idle)),
        }
    }

    /// True until the first navigation has committed a page state.
    #[must_use]
    pub fn is_initial_request(&self) -> bool {
        self.initial_request.load(Ordering::SeqCst)
    }

    /// The phase the most recent navigation is in.
    #[must_use]
    pub fn stage(&self) -> NavigationStage {
        self.stage.lock().expect("route handler lock poisoned").1
    }

    fn begin_stage(&self, seq: u64) -> StageTracker<'_> {
        let shared = self.stage.lock().expect("route handler lock poisoned");
        let current = match shared.1 {
            NavigationStage::Idle | NavigationStage::Settled | NavigationStage::Failed => shared.1,
            // Another navigation is still mid-flight; this one starts fresh.
            _ => NavigationStage::Idle,
        };
        StageTracker {
            handler: self,
            seq,
            current,
        }
    }

    /// Runs a navigation from `from` to `to` and decides its fate.
    ///
    /// Errors raised along the way are routed through the error handler; the
    /// returned `Err` is reserved for failures of the handling machinery
    /// itself.
    pub async fn handle(&self, to: Route, from: Option<Route>) -> Result<NavigationDecision> {
        self.handle_inner(to, from).await
    }

    // Boxed for the server-side redirect recursion.
    fn handle_inner(
        &self,
        to: Route,
        from: Option<Route>,
    ) -> BoxFuture<'_, Result<NavigationDecision>> {
        Box::pin(async move {
            let seq = self.nav_seq.fetch_add(1, Ordering::SeqCst) + 1;
            let was_initial = self.is_initial_request();
            let span = tracing::debug_span!("navigation", seq, to = %to, initial = was_initial);
            let _enter = span.enter();
            let mut stage = self.begin_stage(seq);
            stage.advance(NavigationStage::Preparing);

            let mut before = HookPayload::new().with_json("to", &to);
            before.set_json("from", &from);
            drop(_enter);
            self.app
                .bus()
                .emit(EVENT_ROUTE_BEFORE_NAVIGATION, before)
                .await;

            // Recorded unconditionally so error routing sees the attempt.
            self.app.error_handler().push_navigation(&to.full_path);

            let outcome = self
                .navigate(&mut stage, was_initial, &to, from.as_ref())
                .await;
            let decision = match outcome {
                Ok(decision) => {
                    stage.advance(NavigationStage::Settled);
                    Ok(decision)
                }
                Err(err) => {
                    stage.advance(NavigationStage::Failed);
                    self.handle_navigation_error(err, &to, from.as_ref()).await
                }
            };

            // The shell gate opens after the first navigation settles, no
            // matter how it settled; otherwise an initial error page would
            // render nothing at all.
            if was_initial {
                self.app.store().set(APP_HAS_CONTENT, json!(true));
            }
            decision
        })
    }

    async fn navigate(
        &self,
        stage: &mut StageTracker<'_>,
        was_initial: bool,
        to: &Route,
        from: Option<&Route>,
    ) -> Result<NavigationDecision> {
        let app = &self.app;
        let bus = app.bus();

        let mut query = build_page_query(app, to, was_initial);
        let payload = HookPayload::new()
            .with_json("query", &query)
            .with("slug", json!(to.path));
        let filtered = bus.emit_hook(HOOK_ROUTE_QUERY_FILTER, payload).await?;
        if let Some(filtered_query) = filtered.get_as("query") {
            query = filtered_query;
        }

        let embedded = app.config().initial_state;
        let state = if was_initial && app.is_client() && embedded.is_some() {
            // The server already rendered this state; do not fetch it again.
            stage.advance(NavigationStage::Committing);
            Resource::from_embedded(embedded.unwrap_or_default())
        } else {
            stage.advance(NavigationStage::Fetching);
            app.resource_client()
                .get_additional("page", "bySlug", &query)
                .await?
        };

        if state.response().status == SPECIAL_RESPONSE_STATUS {
            stage.advance(NavigationStage::SpecialResponse);
            return self.handle_special_response(&state);
        }

        if stage.current != NavigationStage::Committing {
            stage.advance(NavigationStage::Committing);
        }

        let mut payload = HookPayload::new().with_json("to", to);
        payload.set_json("from", &from);
        payload.set_state(&state);
        let payload = bus.emit_hook(HOOK_ROUTE_STATE_PRE_PROCESSOR, payload).await?;
        let state = payload.state().unwrap_or(state);

        self.initial_request.store(false, Ordering::SeqCst);

        if app.is_server() {
            app.render_context()
                .set_state_snapshot(serde_json::to_value(&state)?);
        }

        if self.nav_seq.load(Ordering::SeqCst) != stage.seq {
            tracing::debug!(seq = stage.seq, "navigation superseded, discarding its commit");
            return Ok(NavigationDecision::Abort);
        }

        let mut payload = HookPayload::new().with_json("to", to);
        payload.set_json("from", &from);
        payload.set_state(&state);
        let payload = bus
            .emit_hook(HOOK_UPDATE_FRAMEWORK_AFTER_NAVIGATION, payload)
            .await?;
        let payload = bus
            .emit_hook(HOOK_ROUTE_STATE_POST_PROCESSOR, payload)
            .await?;
        bus.emit(EVENT_ROUTE_AFTER_NAVIGATION, payload).await;

        if app.is_server() {
            app.render_context()
                .propagate_cache_directive(state.response());
        }

        Ok(NavigationDecision::Proceed)
    }

    fn handle_special_response(&self, state: &Resource) -> Result<NavigationDecision> {
        let kind = state.get_str("type", "");
        if kind != "redirect" {
            return Err(BridgeError::Protocol(format!(
                "unknown special response type {kind:?}"
            )));
        }
        let target = state.get_str("target", "");
        if target.is_empty() {
            return Err(BridgeError::Protocol(
                "redirect instruction without target".into(),
            ));
        }
        let code = state.get_i64("code", DEFAULT_REDIRECT_CODE) as u16;
        tracing::debug!(target, code, "executing redirect instruction");

        let app = &self.app;
        if app.is_client() {
            match app.render_context().browser_location() {
                Some(location) => location.assign(&target),
                None => tracing::warn!(target, "no browser location installed for redirect"),
            }
        } else {
            if let Some(placeholder) = app.config().ui.redirect_placeholder_component {
                app.store()
                    .set(APP_COMPONENT_OVERRIDE, json!({ "component": placeholder }));
            }
            app.render_context().server_redirect(code, &target);
        }
        Ok(NavigationDecision::Abort)
    }

    async fn handle_navigation_error(
        &self,
        err: BridgeError,
        to: &Route,
        from: Option<&Route>,
    ) -> Result<NavigationDecision> {
        tracing::debug!(error = %err, "navigation failed, entering error handling");
        let handler = self.app.error_handler();
        let error = handler.make_network_error(err);
        error.add_payload("to", serde_json::to_value(to)?);
        error.add_payload("from", serde_json::to_value(from)?);
        if error.payload_value("routerNextValue").is_none() {
            error.add_payload("routerNextValue", json!(false));
        }
        handler.emit_error(error.clone()).await?;

        match error.payload_value("routerNextValue") {
            Some(Value::String(target)) => {
                if self.app.is_server() {
                    // The server render has no host router to hand back to;
                    // serve the error route within this request instead.
                    self.handle_inner(Route::new(target), Some(to.clone())).await
                } else {
                    Ok(NavigationDecision::RedirectTo(target))
                }
            }
            Some(Value::Bool(true)) => Ok(NavigationDecision::Proceed),
            _ => Ok(NavigationDecision::Abort),
        }
    }

}

impl std::fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteHandler")
            .field("stage", &self.stage())
            .field("initial_request", &self.is_initial_request())
            .finish_non_exhaustive()
    }
}
