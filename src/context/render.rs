//! Per-request rendering state.
//!
//! On the server one [`RenderContext`] accompanies one HTTP request: it
//! collects the status the response should carry, the state snapshot to
//! embed for the client, and wraps the host's response object behind the
//! headers-sent guard. On the client it mainly carries the injected global
//! data and the browser location seam.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::domain::ResponseMeta;
use crate::render::{BrowserLocation, ServerResponse};

pub struct RenderContext {
    status: Mutex<u16>,
    state_snapshot: Mutex<Option<Value>>,
    global_data: Mutex<Value>,
    request_url: Mutex<Option<String>>,
    server_response: Mutex<Option<Arc<dyn ServerResponse>>>,
    browser_location: Mutex<Option<Arc<dyn BrowserLocation>>>,
    cache_propagated: AtomicBool,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            status: Mutex::new(200),
            state_snapshot: Mutex::new(None),
            global_data: Mutex::new(Value::Null),
            request_url: Mutex::new(None),
            server_response: Mutex::new(None),
            browser_location: Mutex::new(None),
            cache_propagated: AtomicBool::new(false),
        }
    }
}

impl RenderContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The status the rendered response should carry.
    #[must_use]
    pub fn status(&self) -> u16 {
        *self.status.lock().expect("render context lock poisoned")
    }

    pub fn set_status(&self, status: u16) {
        *self.status.lock().expect("render context lock poisoned") = status;
    }

    /// The page state to embed into the rendered document for the client.
    #[must_use]
    pub fn state_snapshot(&self) -> Option<Value> {
        self.state_snapshot
            .lock()
            .expect("render context lock poisoned")
            .clone()
    }

    pub fn set_state_snapshot(&self, snapshot: Value) {
        *self
            .state_snapshot
            .lock()
            .expect("render context lock poisoned") = Some(snapshot);
    }

    /// Data the server injected into the document, e.g. hybrid translations.
    #[must_use]
    pub fn global_data(&self) -> Value {
        self.global_data
            .lock()
            .expect("render context lock poisoned")
            .clone()
    }

    pub fn set_global_data(&self, data: Value) {
        *self.global_data.lock().expect("render context lock poisoned") = data;
    }

    /// The URL of the request being rendered, on the server.
    #[must_use]
    pub fn request_url(&self) -> Option<String> {
        self.request_url
            .lock()
            .expect("render context lock poisoned")
            .clone()
    }

    pub fn set_request_url(&self, url: impl Into<String>) {
        *self.request_url.lock().expect("render context lock poisoned") = Some(url.into());
    }

    #[must_use]
    pub fn server_response(&self) -> Option<Arc<dyn ServerResponse>> {
        self.server_response
            .lock()
            .expect("render context lock poisoned")
            .clone()
    }

    pub fn install_server_response(&self, response: Arc<dyn ServerResponse>) {
        *self
            .server_response
            .lock()
            .expect("render context lock poisoned") = Some(response);
    }

    #[must_use]
    pub fn browser_location(&self) -> Option<Arc<dyn BrowserLocation>> {
        self.browser_location
            .lock()
            .expect("render context lock poisoned")
            .clone()
    }

    pub fn install_browser_location(&self, location: Arc<dyn BrowserLocation>) {
        *self
            .browser_location
            .lock()
            .expect("render context lock poisoned") = Some(location);
    }

    /// Copies the backend's cache-control directive onto the outgoing
    /// response. Applied at most once per request and skipped entirely once
    /// the response head is flushed.
    pub fn propagate_cache_directive(&self, response_meta: &ResponseMeta) {
        let Some(directive) = response_meta.header("cache-control") else {
            return;
        };
        if self.cache_propagated.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(response) = self.server_response() else {
            return;
        };
        if response.headers_sent() {
            tracing::debug!("response head already flushed, cache directive dropped");
            return;
        }
        response.set_header("Cache-Control", directive);
    }

    /// Issues a server-side redirect, respecting the headers-sent guard.
    pub fn server_redirect(&self, status: u16, target: &str) {
        let Some(response) = self.server_response() else {
            return;
        };
        if response.headers_sent() {
            tracing::warn!(target, "response head already flushed, redirect dropped");
            return;
        }
        response.redirect(status, target);
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("status", &self.status())
            .field("has_snapshot", &self.state_snapshot().is_some())
            .field("request_url", &self.request_url())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct RecordingResponse {
        headers: Mutex<BTreeMap<String, String>>,
        sent: AtomicBool,
    }

    impl ServerResponse for RecordingResponse {
        fn headers_sent(&self) -> bool {
            self.sent.load(Ordering::SeqCst)
        }
        fn set_header(&self, name: &str, value: &str) {
            self.headers
                .lock()
                .unwrap()
                .insert(name.to_string(), value.to_string());
        }
        fn set_status(&self, _status: u16) {}
        fn redirect(&self, _status: u16, _target: &str) {}
    }

    fn meta_with_cache(directive: &str) -> ResponseMeta {
        let mut meta = ResponseMeta::ok();
        meta.headers
            .insert("cache-control".to_string(), directive.to_string());
        meta
    }

    #[test]
    fn cache_directive_is_propagated_once() {
        let ctx = RenderContext::new();
        let response = Arc::new(RecordingResponse::default());
        ctx.install_server_response(Arc::clone(&response) as Arc<dyn ServerResponse>);

        ctx.propagate_cache_directive(&meta_with_cache("max-age=60"));
        ctx.propagate_cache_directive(&meta_with_cache("max-age=9999"));

        let headers = response.headers.lock().unwrap().clone();
        assert_eq!(headers.get("Cache-Control").map(String::as_str), Some("max-age=60"));
    }

    #[test]
    fn flushed_responses_are_left_alone() {
        let ctx = RenderContext::new();
        let response = Arc::new(RecordingResponse::default());
        response.sent.store(true, Ordering::SeqCst);
        ctx.install_server_response(Arc::clone(&response) as Arc<dyn ServerResponse>);

        ctx.propagate_cache_directive(&meta_with_cache("max-age=60"));
        assert!(response.headers.lock().unwrap().is_empty());
    }
}
