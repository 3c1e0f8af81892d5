//! Bootstrap steps shared by both application modes.
//!
//! Each step is a small function taking the context (or the material to
//! build it); the mode-specific boot sequences in [`super::spa`] and
//! [`super::hybrid`] compose them in a fixed order.

use std::sync::Arc;

use serde_json::json;
use url::Url;

use crate::api::{RequestDecorator, ResourceClient};
use crate::config::{AppConfig, AppMode, Environment, ExecutionSide};
use crate::context::app::ContextParts;
use crate::context::{AppContext, RenderContext};
use crate::domain::{BridgeError, Result};
use crate::error::ErrorHandler;
use crate::event::names::{
    HOOK_BEFORE_CONTEXT_CREATE, HOOK_CONTEXT_FILTER, HOOK_INIT, HOOK_INIT_CLIENT, HOOK_INIT_SERVER,
};
use crate::event::{EventBus, HookPayload};
use crate::modules::Translation;
use crate::observability::init_tracing;
use crate::render::{
    BrowserLocation, MarkupDocument, MetaSink, Renderer, Router, ServerResponse,
};
use crate::store::Store;

use super::FrameworkRuntime;

/// Environment variable overriding the deployment environment.
pub const ENV_VAR_ENVIRONMENT: &str = "PAGEBRIDGE_ENV";

/// Environment variable overriding the execution side.
pub const ENV_VAR_EXECUTION_SIDE: &str = "PAGEBRIDGE_SIDE";

/// Everything the host environment injects into a bootstrap.
///
/// Only the resource client is mandatory; the remaining collaborators depend
/// on mode and execution side.
#[derive(Clone)]
pub struct HostBindings {
    pub resource_client: Arc<dyn ResourceClient>,
    pub renderer: Option<Arc<dyn Renderer>>,
    pub router: Option<Arc<dyn Router>>,
    pub document: Option<Arc<dyn MarkupDocument>>,
    pub server_response: Option<Arc<dyn ServerResponse>>,
    pub browser_location: Option<Arc<dyn BrowserLocation>>,
    pub meta_sink: Option<Arc<dyn MetaSink>>,
    pub header_sink: Option<Arc<dyn RequestDecorator>>,
    pub request_url: Option<String>,
    pub global_data: Option<serde_json::Value>,
}

impl HostBindings {
    #[must_use]
    pub fn new(resource_client: Arc<dyn ResourceClient>) -> Self {
        Self {
            resource_client,
            renderer: None,
            router: None,
            document: None,
            server_response: None,
            browser_location: None,
            meta_sink: None,
            header_sink: None,
            request_url: None,
            global_data: None,
        }
    }
}

impl std::fmt::Debug for HostBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBindings")
            .field("has_renderer", &self.renderer.is_some())
            .field("has_router", &self.router.is_some())
            .field("has_document", &self.document.is_some())
            .field("request_url", &self.request_url)
            .finish_non_exhaustive()
    }
}

/// Resolved backend endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    /// The configured site base URL.
    pub base: Url,
    /// Base plus the API root segment.
    pub api: Url,
    /// API root plus the resource segment.
    pub resources: Url,
}

/// Resolves the deployment environment: config override first, then the
/// process environment, defaulting to production.
#[must_use]
pub fn resolve_environment(config: &AppConfig) -> Environment {
    if let Some(environment) = config.environment {
        return environment;
    }
    match std::env::var(ENV_VAR_ENVIRONMENT).as_deref() {
        Ok("development" | "dev") => Environment::Development,
        _ => Environment::Production,
    }
}

/// Resolves the execution side: config override first, then the process
/// environment, defaulting to client.
#[must_use]
pub fn resolve_execution_side(config: &AppConfig) -> ExecutionSide {
    if let Some(side) = config.execution_side {
        return side;
    }
    match std::env::var(ENV_VAR_EXECUTION_SIDE).as_deref() {
        Ok("server" | "ssr") => ExecutionSide::Server,
        _ => ExecutionSide::Client,
    }
}

/// Assembles the backend endpoint URLs from the API configuration. In
/// development the dev base URL wins when configured.
pub fn resolve_api_endpoints(
    config: &AppConfig,
    environment: Environment,
) -> Result<ApiEndpoints> {
    let base = match environment {
        Environment::Development => config
            .api
            .dev_base_url
            .as_deref()
            .or(config.api.base_url.as_deref()),
        Environment::Production => config.api.base_url.as_deref(),
    }
    .ok_or_else(|| BridgeError::Config("api.baseUrl is not configured".into()))?;

    let base = Url::parse(base)
        .map_err(|err| BridgeError::Config(format!("api.baseUrl is not a valid URL: {err}")))?;
    let api = with_segment(&base, &config.api.root_uri_part)?;
    let resources = with_segment(&api, &config.api.resource_base_uri_part)?;
    Ok(ApiEndpoints {
        base,
        api,
        resources,
    })
}

fn with_segment(base: &Url, segment: &str) -> Result<Url> {
    let mut assembled = base.to_string();
    if !assembled.ends_with('/') {
        assembled.push('/');
    }
    assembled.push_str(segment.trim_matches('/'));
    assembled.push('/');
    Url::parse(&assembled)
        .map_err(|err| BridgeError::Config(format!("invalid api path segment {segment:?}: {err}")))
}

/// Builds the application context: tracing, event bindings, the
/// before-context-create hook, store, error handler and translation service.
pub async fn make_app_context(
    runtime: &FrameworkRuntime,
    mode: AppMode,
    config: AppConfig,
    bindings: &HostBindings,
) -> Result<AppContext> {
    init_tracing(runtime, config.trace_level.as_deref());

    let bus = Arc::new(EventBus::new());
    for binding in &config.events {
        bus.on_listener(&binding.event, Arc::clone(&binding.listener));
    }

    // The hook sees the serializable projection of the config; callbacks are
    // grafted back afterwards.
    let payload = HookPayload::new().with_json("config", &config);
    let filtered = bus.emit_hook(HOOK_BEFORE_CONTEXT_CREATE, payload).await?;
    let config = match filtered.get_as::<AppConfig>("config") {
        Some(mut updated) => {
            updated.restore_callbacks(&config);
            updated
        }
        None => config,
    };

    let environment = resolve_environment(&config);
    let execution_side = resolve_execution_side(&config);
    tracing::debug!(?mode, ?environment, ?execution_side, "creating app context");

    let store = Arc::new(Store::with_initial(config.initial_store.clone()));
    let error_handler = Arc::new(ErrorHandler::new(config.error_handling.clone()));

    let translation = Translation::new(
        Arc::clone(&bindings.resource_client),
        &bus,
        &config.translation.initial_locale,
    );
    if let Some(sink) = &bindings.header_sink {
        translation.register_header_sink(Arc::clone(sink));
    }

    let render_context = Arc::new(RenderContext::new());
    if let Some(response) = &bindings.server_response {
        render_context.install_server_response(Arc::clone(response));
    }
    if let Some(location) = &bindings.browser_location {
        render_context.install_browser_location(Arc::clone(location));
    }
    if let Some(url) = &bindings.request_url {
        render_context.set_request_url(url.clone());
    }

    Ok(AppContext::from_parts(ContextParts {
        mode,
        environment,
        execution_side,
        config,
        store,
        bus,
        error_handler,
        translation,
        resource_client: Arc::clone(&bindings.resource_client),
        render_context,
    }))
}

/// Runs the context filter hook. The payload is informational; listeners
/// extend the application through the handles they captured at bind time.
pub async fn apply_context_filter(app: &AppContext) -> Result<()> {
    let payload = HookPayload::new()
        .with_json("mode", &app.mode())
        .with_json("environment", &app.environment())
        .with_json("executionSide", &app.execution_side());
    app.bus().emit_hook(HOOK_CONTEXT_FILTER, payload).await?;
    Ok(())
}

/// Emits the init hook, followed by its side-specific variant.
pub async fn emit_init_hooks(app: &AppContext) -> Result<()> {
    let payload = HookPayload::new().with("hasContent", json!(false));
    app.bus().emit_hook(HOOK_INIT, payload.clone()).await?;
    let side_hook = if app.is_server() {
        HOOK_INIT_SERVER
    } else {
        HOOK_INIT_CLIENT
    };
    app.bus().emit_hook(side_hook, payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ResourceQuery;
    use crate::domain::{Collection, Resource};
    use async_trait::async_trait;

    struct NullClient;

    #[async_trait]
    impl ResourceClient for NullClient {
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
            _resource_type: &str,
            _uri_fragment: &str,
            _query: &ResourceQuery,
        ) -> Result<Resource> {
            Ok(Resource::default())
        }
    }

    fn config_with_base(base: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.api.base_url = Some(base.to_string());
        config
    }

    #[test]
    fn endpoints_are_assembled_with_clean_slashes() {
        let endpoints =
            resolve_api_endpoints(&config_with_base("https://cms.example.org"), Environment::Production)
                .unwrap();
        assert_eq!(endpoints.api.as_str(), "https://cms.example.org/api/");
        assert_eq!(
            endpoints.resources.as_str(),
            "https://cms.example.org/api/resources/"
        );
    }

    #[test]
    fn development_prefers_the_dev_base_url() {
        let mut config = config_with_base("https://cms.example.org");
        config.api.dev_base_url = Some("http://localhost:8080/".to_string());
        let endpoints = resolve_api_endpoints(&config, Environment::Development).unwrap();
        assert_eq!(endpoints.api.as_str(), "http://localhost:8080/api/");
    }

    #[test]
    fn missing_base_url_is_a_config_error() {
        let err = resolve_api_endpoints(&AppConfig::default(), Environment::Production).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[tokio::test]
    async fn the_config_filter_hook_can_rewrite_the_config() {
        let runtime = FrameworkRuntime::new();
        let mut config = config_with_base("https://cms.example.org");
        config.environment = Some(Environment::Production);
        config.execution_side = Some(ExecutionSide::Client);
        config.events.push(crate::config::EventBinding {
            event: HOOK_BEFORE_CONTEXT_CREATE.to_string(),
            listener: Arc::new(|mut payload| {
                Box::pin(async move {
                    let mut config: AppConfig = payload.get_as("config").unwrap();
                    config.translation.initial_locale = "de".to_string();
                    payload.set_json("config", &config);
                    Ok(payload)
                }) as crate::event::ListenerFuture
            }),
        });

        let bindings = HostBindings::new(Arc::new(NullClient));
        let app = make_app_context(&runtime, AppMode::Spa, config, &bindings)
            .await
            .unwrap();
        assert_eq!(app.config().translation.initial_locale, "de");
        assert_eq!(app.translation().language_code(), "de");
    }
}
