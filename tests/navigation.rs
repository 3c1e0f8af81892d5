//! End-to-end navigation flows against mocked host collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::Notify;

use pagebridge::bootstrap::basic::make_app_context;
use pagebridge::bootstrap::spa::{register_concrete_error_handler, register_page_context};
use pagebridge::config::{AppMode, ErrorRoute};
use pagebridge::domain::{Collection, ResponseMeta};
use pagebridge::event::names::EVENT_ROUTE_AFTER_NAVIGATION;
use pagebridge::render::{BrowserLocation, ComponentRef, ServerResponse};
use pagebridge::store::keys::{APP_ERROR_COMPONENT, APP_HAS_CONTENT};
use pagebridge::{
    boot_spa, AppConfig, AppContext, BridgeError, Environment, ExecutionSide, FrameworkRuntime,
    HostBindings, Include, NavigationDecision, NavigationStage, Resource, ResourceClient,
    ResourceQuery, Result, Route, RouteHandler,
};

/// Page backend stub: responses keyed by slug, every query recorded, an
/// optional gate per slug to hold a fetch open.
#[derive(Default)]
struct MockBackend {
    pages: Mutex<HashMap<String, Result<Resource>>>,
    queries: Mutex<Vec<ResourceQuery>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MockBackend {
    fn serve(&self, slug: &str, page: Resource) {
        self.pages.lock().unwrap().insert(slug.to_string(), Ok(page));
    }

    fn gate(&self, slug: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(slug.to_string(), Arc::clone(&gate));
        gate
    }

    fn queries(&self) -> Vec<ResourceQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceClient for MockBackend {
    async fn get_resource(
        &self,
        _resource_type: &str,
        _id: &str,
        _query: &ResourceQuery,
    ) -> Result<Resource> {
        Ok(Resource::default())
    }

    async fn get_collection(
        &self,
        _resource_type: &str,
        _query: &ResourceQuery,
    ) -> Result<Collection> {
        Ok(Collection::default())
    }

    async fn get_additional(
        &self,
        resource_type: &str,
        uri_fragment: &str,
        query: &ResourceQuery,
    ) -> Result<Resource> {
        assert_eq!((resource_type, uri_fragment), ("page", "bySlug"));
        self.queries.lock().unwrap().push(query.clone());
        let slug = query.slug.clone().unwrap_or_default();
        let gate = self.gates.lock().unwrap().get(&slug).map(Arc::clone);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.pages
            .lock()
            .unwrap()
            .get(&slug)
            .cloned()
            .unwrap_or_else(|| Err(BridgeError::fetch_with_status(404, "page not found")))
    }
}

fn page(id: i64, layout: &str) -> Resource {
    Resource::from_embedded(json!({
        "id": id,
        "languageCode": "en",
        "pageLayout": layout,
        "data": {"title": format!("page {id}")},
    }))
}

fn base_config(side: ExecutionSide) -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = Some(Environment::Production);
    config.execution_side = Some(side);
    config.api.base_url = Some("https://cms.example.org".to_string());
    config.ui.app_component = Some(ComponentRef::new("app-root"));
    config.ui.error_component = Some(ComponentRef::new("error-view"));
    config
}

async fn spa(
    config: AppConfig,
    bindings: HostBindings,
) -> (AppContext, Arc<RouteHandler>) {
    let runtime = FrameworkRuntime::new();
    let app = make_app_context(&runtime, AppMode::Spa, config, &bindings)
        .await
        .unwrap();
    register_concrete_error_handler(&app);
    register_page_context(&app).unwrap();
    (app.clone(), Arc::new(RouteHandler::new(app)))
}

#[tokio::test]
async fn initial_navigation_requests_everything_and_opens_the_shell_gate() {
    let backend = Arc::new(MockBackend::default());
    backend.serve("/home", page(1, "default"));
    let (app, routes) = spa(
        base_config(ExecutionSide::Client),
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    assert!(!app.store().get_bool(APP_HAS_CONTENT, false));
    let decision = routes.handle(Route::new("/home"), None).await.unwrap();
    assert_eq!(decision, NavigationDecision::Proceed);

    let queries = backend.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].include, Include::All);
    assert_eq!(queries[0].slug.as_deref(), Some("/home"));

    assert!(app.store().get_bool(APP_HAS_CONTENT, false));
    let page_ctx = app.page_context().unwrap();
    assert_eq!(page_ctx.id(), 1);
    assert_eq!(page_ctx.current_route(), Some(Route::new("/home")));
}

#[tokio::test]
async fn subsequent_navigations_announce_what_the_client_already_has() {
    let backend = Arc::new(MockBackend::default());
    backend.serve("/home", page(1, "landing"));
    backend.serve("/about", page(2, "default"));
    let mut config = base_config(ExecutionSide::Client);
    config.router.refresh_common_elements = vec!["footer".to_string(), "nav".to_string()];
    let (app, routes) = spa(
        config,
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    routes.handle(Route::new("/home"), None).await.unwrap();
    routes
        .handle(Route::new("/about"), Some(Route::new("/home")))
        .await
        .unwrap();

    let queries = backend.queries();
    assert_eq!(queries.len(), 2);
    let second = &queries[1];
    assert_eq!(
        second.include,
        Include::Fields(vec!["content".to_string(), "data".to_string()])
    );
    assert_eq!(second.current_layout.as_deref(), Some("landing"));
    assert_eq!(second.refresh_common.as_deref(), Some("footer,nav"));
    assert_eq!(app.page_context().unwrap().id(), 2);
}

#[tokio::test]
async fn failed_navigations_install_the_inline_error_component() {
    let backend = Arc::new(MockBackend::default());
    let (app, routes) = spa(
        base_config(ExecutionSide::Client),
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    let decision = routes.handle(Route::new("/missing"), None).await.unwrap();
    assert_eq!(decision, NavigationDecision::Abort);

    let error = app.error_handler().last_error().unwrap();
    assert_eq!(error.code(), 404);
    assert!(error.is_handled());

    let slot = app.store().get(APP_ERROR_COMPONENT, json!(null));
    assert_eq!(slot.get("component"), Some(&json!("error-view")));

    // The error carries the paths recorded up to the failure.
    assert_eq!(error.navigation_stack(), vec!["/missing"]);

    // The shell gate opens even though the first navigation failed.
    assert!(app.store().get_bool(APP_HAS_CONTENT, false));
    assert_eq!(app.page_context().unwrap().id(), -1);
}

#[tokio::test]
async fn matched_error_routes_redirect_through_the_decision() {
    let backend = Arc::new(MockBackend::default());
    let mut config = base_config(ExecutionSide::Client);
    config.error_handling.routes.push(ErrorRoute {
        code: 404,
        path: "/not-found".to_string(),
        ..ErrorRoute::default()
    });
    let (_app, routes) = spa(
        config,
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    let decision = routes.handle(Route::new("/missing"), None).await.unwrap();
    assert_eq!(
        decision,
        NavigationDecision::RedirectTo("/not-found".to_string())
    );
}

#[tokio::test]
async fn error_redirect_loops_fall_back_to_the_root() {
    let backend = Arc::new(MockBackend::default());
    let mut config = base_config(ExecutionSide::Client);
    config.error_handling.routes.push(ErrorRoute {
        code: 404,
        path: "/boom".to_string(),
        ..ErrorRoute::default()
    });
    let (_app, routes) = spa(
        config,
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    let first = routes.handle(Route::new("/missing"), None).await.unwrap();
    assert_eq!(first, NavigationDecision::RedirectTo("/boom".to_string()));

    // The error page itself fails; redirecting to it again would loop.
    let second = routes
        .handle(Route::new("/boom"), Some(Route::new("/missing")))
        .await
        .unwrap();
    assert_eq!(second, NavigationDecision::RedirectTo("/".to_string()));
}

#[tokio::test]
async fn loops_through_the_root_render_the_inline_error_component() {
    let backend = Arc::new(MockBackend::default());
    let mut config = base_config(ExecutionSide::Client);
    config.error_handling.routes.push(ErrorRoute {
        code: 404,
        path: "/boom".to_string(),
        ..ErrorRoute::default()
    });
    let (app, routes) = spa(
        config,
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    // The root page itself fails, so falling back to it would loop as well.
    let first = routes.handle(Route::new("/"), None).await.unwrap();
    assert_eq!(first, NavigationDecision::RedirectTo("/boom".to_string()));

    let second = routes
        .handle(Route::new("/boom"), Some(Route::new("/")))
        .await
        .unwrap();
    assert_eq!(second, NavigationDecision::Abort);

    let slot = app.store().get(APP_ERROR_COMPONENT, json!(null));
    assert_eq!(slot.get("component"), Some(&json!("error-view")));
}

#[tokio::test]
async fn redirect_instructions_leave_the_page_state_untouched() {
    #[derive(Default)]
    struct RecordingLocation(Mutex<Vec<String>>);
    impl BrowserLocation for RecordingLocation {
        fn assign(&self, url: &str) {
            self.0.lock().unwrap().push(url.to_string());
        }
    }

    let backend = Arc::new(MockBackend::default());
    backend.serve(
        "/moved",
        Resource::new(
            json!({"type": "redirect", "target": "https://elsewhere.example.org/", "code": 302}),
            ResponseMeta::with_status(203),
        ),
    );
    let location = Arc::new(RecordingLocation::default());
    let mut bindings = HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>);
    bindings.browser_location = Some(Arc::clone(&location) as Arc<dyn BrowserLocation>);
    let (app, routes) = spa(base_config(ExecutionSide::Client), bindings).await;

    let decision = routes.handle(Route::new("/moved"), None).await.unwrap();
    assert_eq!(decision, NavigationDecision::Abort);
    assert_eq!(
        location.0.lock().unwrap().clone(),
        vec!["https://elsewhere.example.org/".to_string()]
    );
    assert_eq!(app.page_context().unwrap().id(), -1);
    assert_eq!(app.page_context().unwrap().current_route(), None);
}

#[tokio::test]
async fn malformed_instructions_go_through_error_handling() {
    let backend = Arc::new(MockBackend::default());
    backend.serve(
        "/odd",
        Resource::new(
            json!({"type": "teapot"}),
            ResponseMeta::with_status(203),
        ),
    );
    let (app, routes) = spa(
        base_config(ExecutionSide::Client),
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    let decision = routes.handle(Route::new("/odd"), None).await.unwrap();
    assert_eq!(decision, NavigationDecision::Abort);
    let error = app.error_handler().last_error().unwrap();
    assert_eq!(error.code(), 500);
    assert!(error.message().contains("special response"));
}

#[tokio::test]
async fn superseded_navigations_do_not_commit() {
    let backend = Arc::new(MockBackend::default());
    backend.serve("/slow", page(10, "default"));
    backend.serve("/fast", page(20, "default"));
    let gate = backend.gate("/slow");
    let (app, routes) = spa(
        base_config(ExecutionSide::Client),
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    let slow = {
        let routes = Arc::clone(&routes);
        tokio::spawn(async move { routes.handle(Route::new("/slow"), None).await })
    };
    tokio::task::yield_now().await;

    let fast = routes.handle(Route::new("/fast"), None).await.unwrap();
    assert_eq!(fast, NavigationDecision::Proceed);
    assert_eq!(app.page_context().unwrap().id(), 20);

    gate.notify_one();
    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow, NavigationDecision::Abort);
    assert_eq!(app.page_context().unwrap().id(), 20);
}

#[tokio::test]
async fn a_superseded_failure_does_not_disturb_the_settled_stage() {
    let backend = Arc::new(MockBackend::default());
    backend.serve("/fast", page(20, "default"));
    let gate = backend.gate("/slow-missing");
    let (app, routes) = spa(
        base_config(ExecutionSide::Client),
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    let slow = {
        let routes = Arc::clone(&routes);
        tokio::spawn(async move { routes.handle(Route::new("/slow-missing"), None).await })
    };
    tokio::task::yield_now().await;

    let fast = routes.handle(Route::new("/fast"), None).await.unwrap();
    assert_eq!(fast, NavigationDecision::Proceed);
    assert_eq!(routes.stage(), NavigationStage::Settled);

    gate.notify_one();
    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow, NavigationDecision::Abort);
    // The superseded navigation failed, but the observable stage stays with
    // the navigation that won.
    assert_eq!(routes.stage(), NavigationStage::Settled);
    assert_eq!(app.page_context().unwrap().id(), 20);
}

#[tokio::test]
async fn embedded_initial_state_skips_the_first_fetch() {
    let backend = Arc::new(MockBackend::default());
    backend.serve("/about", page(2, "default"));
    let mut config = base_config(ExecutionSide::Client);
    config.initial_state = Some(json!({
        "id": 9,
        "languageCode": "en",
        "pageLayout": "default",
        "data": {"title": "embedded"},
    }));
    let (app, routes) = spa(
        config,
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    let first = routes.handle(Route::new("/home"), None).await.unwrap();
    assert_eq!(first, NavigationDecision::Proceed);
    assert!(backend.queries().is_empty());
    assert_eq!(app.page_context().unwrap().id(), 9);

    routes
        .handle(Route::new("/about"), Some(Route::new("/home")))
        .await
        .unwrap();
    assert_eq!(backend.queries().len(), 1);
    assert_eq!(app.page_context().unwrap().id(), 2);
}

#[tokio::test]
async fn after_navigation_event_carries_the_committed_state() {
    let backend = Arc::new(MockBackend::default());
    backend.serve("/home", page(1, "default"));
    let (app, routes) = spa(
        base_config(ExecutionSide::Client),
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    let seen: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    app.bus().on_fn(EVENT_ROUTE_AFTER_NAVIGATION, move |payload| {
        if let Some(state) = payload.state() {
            sink.lock().unwrap().push(state.get_i64("id", -1));
        }
    });

    routes.handle(Route::new("/home"), None).await.unwrap();
    assert_eq!(seen.lock().unwrap().clone(), vec![1]);
}

/// SSR response stub with a headers-sent switch.
#[derive(Default)]
struct MockResponse {
    headers: Mutex<Vec<(String, String)>>,
    status: Mutex<Option<u16>>,
}

impl ServerResponse for MockResponse {
    fn headers_sent(&self) -> bool {
        false
    }
    fn set_header(&self, name: &str, value: &str) {
        self.headers
            .lock()
            .unwrap()
            .push((name.to_string(), value.to_string()));
    }
    fn set_status(&self, status: u16) {
        *self.status.lock().unwrap() = Some(status);
    }
    fn redirect(&self, status: u16, target: &str) {
        *self.status.lock().unwrap() = Some(status);
        self.headers
            .lock()
            .unwrap()
            .push(("Location".to_string(), target.to_string()));
    }
}

#[tokio::test]
async fn server_navigations_snapshot_state_and_propagate_caching() {
    let backend = Arc::new(MockBackend::default());
    let mut meta = ResponseMeta::ok();
    meta.headers
        .insert("cache-control".to_string(), "max-age=300".to_string());
    backend.serve(
        "/home",
        Resource::new(json!({"id": 1, "data": {}}), meta),
    );

    let response = Arc::new(MockResponse::default());
    let mut bindings = HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>);
    bindings.server_response = Some(Arc::clone(&response) as Arc<dyn ServerResponse>);
    let (app, routes) = spa(base_config(ExecutionSide::Server), bindings).await;

    routes.handle(Route::new("/home"), None).await.unwrap();

    let snapshot = app.render_context().state_snapshot().unwrap();
    assert_eq!(snapshot.get("data").and_then(|d| d.get("id")), Some(&json!(1)));
    assert!(response
        .headers
        .lock()
        .unwrap()
        .contains(&("Cache-Control".to_string(), "max-age=300".to_string())));
}

#[tokio::test]
async fn server_error_redirects_are_served_within_the_same_request() {
    let backend = Arc::new(MockBackend::default());
    backend.serve("/error-404", page(40, "default"));
    let mut config = base_config(ExecutionSide::Server);
    config.error_handling.routes.push(ErrorRoute {
        code: 404,
        path: "/error-404".to_string(),
        ..ErrorRoute::default()
    });
    let response = Arc::new(MockResponse::default());
    let mut bindings = HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>);
    bindings.server_response = Some(Arc::clone(&response) as Arc<dyn ServerResponse>);
    let (app, routes) = spa(config, bindings).await;

    let decision = routes.handle(Route::new("/missing"), None).await.unwrap();
    assert_eq!(decision, NavigationDecision::Proceed);
    assert_eq!(app.page_context().unwrap().id(), 40);
    assert_eq!(
        app.page_context().unwrap().current_route(),
        Some(Route::new("/error-404"))
    );
    // The response keeps the error status and anti-caching headers.
    assert_eq!(*response.status.lock().unwrap(), Some(404));
    assert!(response
        .headers
        .lock()
        .unwrap()
        .iter()
        .any(|(name, _)| name == "Pragma"));
}

#[tokio::test]
async fn boot_spa_serves_the_requested_url_on_the_server() {
    let backend = Arc::new(MockBackend::default());
    backend.serve("/landing", page(7, "default"));
    let response = Arc::new(MockResponse::default());
    let mut bindings = HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>);
    bindings.server_response = Some(Arc::clone(&response) as Arc<dyn ServerResponse>);
    bindings.request_url = Some("/landing".to_string());
    let runtime = FrameworkRuntime::new();

    let (app, routes) = boot_spa(&runtime, base_config(ExecutionSide::Server), bindings)
        .await
        .unwrap();

    // The boot itself drove the initial navigation.
    assert!(!routes.is_initial_request());
    assert!(app.store().get_bool(APP_HAS_CONTENT, false));
    assert_eq!(app.page_context().unwrap().id(), 7);
    assert_eq!(
        app.page_context().unwrap().current_route(),
        Some(Route::new("/landing"))
    );
    let snapshot = app.render_context().state_snapshot().unwrap();
    assert_eq!(
        snapshot.get("data").and_then(|d| d.get("id")),
        Some(&json!(7))
    );
}

#[tokio::test]
async fn boot_spa_drains_error_handling_when_the_request_fails() {
    let backend = Arc::new(MockBackend::default());
    let response = Arc::new(MockResponse::default());
    let mut bindings = HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>);
    bindings.server_response = Some(Arc::clone(&response) as Arc<dyn ServerResponse>);
    bindings.request_url = Some("/vanished".to_string());
    let runtime = FrameworkRuntime::new();

    let (app, _routes) = boot_spa(&runtime, base_config(ExecutionSide::Server), bindings)
        .await
        .unwrap();

    let error = app.error_handler().last_error().unwrap();
    assert_eq!(error.code(), 404);
    assert!(error.is_handled());
    assert_eq!(*response.status.lock().unwrap(), Some(404));
}

#[tokio::test]
async fn wrapping_an_existing_app_error_keeps_the_instance() {
    let backend = Arc::new(MockBackend::default());
    let (app, _routes) = spa(
        base_config(ExecutionSide::Client),
        HostBindings::new(Arc::clone(&backend) as Arc<dyn ResourceClient>),
    )
    .await;

    let handler = app.error_handler();
    let original = handler.make_network_error(BridgeError::fetch_with_status(404, "gone"));
    let rewrapped = handler.make_global_error(original.clone());
    assert!(rewrapped.same_instance(&original));

    handler.emit_error(original.clone()).await.unwrap();
    handler.emit_error(rewrapped).await.unwrap();
    assert!(original.is_handled());
}
