//! The application context: the composition root every subsystem hangs off.
//!
//! One [`AppContext`] is created per application instance during bootstrap.
//! It is a cheap-to-clone handle; hybrid widget contexts are derived from
//! their parent with [`AppContext::derive_child`] and share the store, bus,
//! error handler and translation service while owning their component
//! registry.

use std::sync::{Arc, Mutex, RwLock};

use crate::api::ResourceClient;
use crate::config::{AppConfig, AppMode, Environment, ExecutionSide};
use crate::domain::{BridgeError, Result};
use crate::error::{ErrorHandler, FailureReason};
use crate::event::EventBus;
use crate::modules::Translation;
use crate::render::ComponentResolverChain;
use crate::store::Store;

use super::{PageContext, RenderContext};

/// Everything an [`AppContext`] is assembled from. Built by the bootstrap.
pub(crate) struct ContextParts {
    pub mode: AppMode,
    pub environment: Environment,
    pub execution_side: ExecutionSide,
    pub config: AppConfig,
    pub store: Arc<Store>,
    pub bus: Arc<EventBus>,
    pub error_handler: Arc<ErrorHandler>,
    pub translation: Translation,
    pub resource_client: Arc<dyn ResourceClient>,
    pub render_context: Arc<RenderContext>,
}

struct AppContextInner {
    mode: AppMode,
    environment: Environment,
    execution_side: ExecutionSide,
    config: RwLock<AppConfig>,
    store: Arc<Store>,
    bus: Arc<EventBus>,
    error_handler: Arc<ErrorHandler>,
    translation: Translation,
    resource_client: Arc<dyn ResourceClient>,
    render_context: Arc<RenderContext>,
    resolver: Arc<ComponentResolverChain>,
    page: Mutex<Option<Arc<PageContext>>>,
}

/// Handle to one application instance. Cloning is cheap and shares state.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<AppContextInner>,
}

impl AppContext {
    pub(crate) fn from_parts(parts: ContextParts) -> Self {
        Self {
            inner: Arc::new(AppContextInner {
                mode: parts.mode,
                environment: parts.environment,
                execution_side: parts.execution_side,
                config: RwLock::new(parts.config),
                store: parts.store,
                bus: parts.bus,
                error_handler: parts.error_handler,
                translation: parts.translation,
                resource_client: parts.resource_client,
                render_context: parts.render_context,
                resolver: Arc::new(ComponentResolverChain::new()),
                page: Mutex::new(None),
            }),
        }
    }

    /// Derives a child context for an isolated widget. The child shares the
    /// store, bus, error handler, translation service and render context;
    /// its component resolver chains back into the parent's and it has no
    /// page context of its own.
    #[must_use]
    pub fn derive_child(&self) -> AppContext {
        let inner = &self.inner;
        Self {
            inner: Arc::new(AppContextInner {
                mode: inner.mode,
                environment: inner.environment,
                execution_side: inner.execution_side,
                config: RwLock::new(self.config()),
                store: Arc::clone(&inner.store),
                bus: Arc::clone(&inner.bus),
                error_handler: Arc::clone(&inner.error_handler),
                translation: inner.translation.clone(),
                resource_client: Arc::clone(&inner.resource_client),
                render_context: Arc::clone(&inner.render_context),
                resolver: Arc::new(ComponentResolverChain::with_parent(Arc::clone(
                    &inner.resolver,
                ))),
                page: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn mode(&self) -> AppMode {
        self.inner.mode
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.inner.environment
    }

    #[must_use]
    pub fn execution_side(&self) -> ExecutionSide {
        self.inner.execution_side
    }

    #[must_use]
    pub fn is_client(&self) -> bool {
        self.inner.execution_side == ExecutionSide::Client
    }

    #[must_use]
    pub fn is_server(&self) -> bool {
        self.inner.execution_side == ExecutionSide::Server
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        self.inner.environment == Environment::Development
    }

    /// A snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> AppConfig {
        self.inner
            .config
            .read()
            .expect("app context lock poisoned")
            .clone()
    }

    /// Applies a configuration mutation. Used by bootstrap steps that run
    /// config filter hooks after the context exists.
    pub(crate) fn update_config(&self, apply: impl FnOnce(&mut AppConfig)) {
        apply(
            &mut self
                .inner
                .config
                .write()
                .expect("app context lock poisoned"),
        );
    }

    #[must_use]
    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.inner.store)
    }

    #[must_use]
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.inner.bus)
    }

    #[must_use]
    pub fn error_handler(&self) -> Arc<ErrorHandler> {
        Arc::clone(&self.inner.error_handler)
    }

    #[must_use]
    pub fn translation(&self) -> Translation {
        self.inner.translation.clone()
    }

    #[must_use]
    pub fn resource_client(&self) -> Arc<dyn ResourceClient> {
        Arc::clone(&self.inner.resource_client)
    }

    #[must_use]
    pub fn render_context(&self) -> Arc<RenderContext> {
        Arc::clone(&self.inner.render_context)
    }

    #[must_use]
    pub fn resolver(&self) -> Arc<ComponentResolverChain> {
        Arc::clone(&self.inner.resolver)
    }

    /// The page context. Only SPA contexts carry one.
    pub fn page_context(&self) -> Result<Arc<PageContext>> {
        self.inner
            .page
            .lock()
            .expect("app context lock poisoned")
            .clone()
            .ok_or_else(|| {
                BridgeError::Bootstrap("no page context installed on this context".into())
            })
    }

    pub(crate) fn install_page_context(&self, page: Arc<PageContext>) {
        *self.inner.page.lock().expect("app context lock poisoned") = Some(page);
    }

    /// Wraps and handles a failure as a global error.
    pub async fn report_global_error(&self, reason: impl Into<FailureReason>) -> Result<()> {
        let error = self.inner.error_handler.make_global_error(reason);
        self.inner.error_handler.emit_error(error).await
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("mode", &self.inner.mode)
            .field("environment", &self.inner.environment)
            .field("execution_side", &self.inner.execution_side)
            .finish_non_exhaustive()
    }
}
