//! Central error sink.
//!
//! The handler owns the navigation-history ring used for loop detection,
//! turns arbitrary failure reasons into [`AppError`]s through idempotent
//! factories, and drives the pluggable concrete handler exactly once per
//! error instance. In-flight handling is counted so the server-rendering
//! path can block on [`ErrorHandler::wait_for_all`] before flushing the
//! response.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use tokio::sync::Notify;

use crate::config::ErrorConfig;
use crate::domain::Result;

use super::{AppError, AppErrorType, FailureReason};

/// Paths remembered for loop detection.
const NAVIGATION_STACK_LIMIT: usize = 5;

/// Flags a concrete handler may flip while handling one error.
#[derive(Debug, Clone, Copy)]
pub struct HandlerFlags {
    /// Skip all remaining handling for this error.
    pub ignore: bool,

    /// Print the error through the console layer afterwards.
    pub print_to_console: bool,

    /// Forward the error to the configured logger callback afterwards.
    pub send_to_logger: bool,
}

impl Default for HandlerFlags {
    fn default() -> Self {
        Self {
            ignore: false,
            print_to_console: true,
            send_to_logger: true,
        }
    }
}

/// Everything a concrete handler gets to see and mutate for one error.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// The error being handled. A shared handle; payload mutations are
    /// visible to the call site that raised the error.
    pub error: AppError,

    /// Snapshot of the error-handling configuration.
    pub config: ErrorConfig,

    /// Post-handling behavior flags.
    pub flags: HandlerFlags,
}

/// The pluggable mode-specific handling strategy.
pub type ConcreteErrorHandler =
    Arc<dyn Fn(HandlerContext) -> BoxFuture<'static, HandlerContext> + Send + Sync>;

/// The framework-wide error handler.
pub struct ErrorHandler {
    config: ErrorConfig,
    navigation_stack: Mutex<VecDeque<String>>,
    concrete: Mutex<Option<ConcreteErrorHandler>>,
    last_error: Mutex<Option<AppError>>,
    pending: Mutex<usize>,
    drained: Notify,
}

impl ErrorHandler {
    /// Creates a handler with no concrete strategy installed; errors are
    /// still classified, printed and logged.
    #[must_use]
    pub fn new(config: ErrorConfig) -> Self {
        Self {
            config,
            navigation_stack: Mutex::new(VecDeque::new()),
            concrete: Mutex::new(None),
            last_error: Mutex::new(None),
            pending: Mutex::new(0),
            drained: Notify::new(),
        }
    }

    /// Installs the mode-specific handling strategy. Replaces any previous
    /// one.
    pub fn set_concrete_handler(&self, handler: ConcreteErrorHandler) {
        *self.concrete.lock().expect("error handler lock poisoned") = Some(handler);
    }

    /// The error-handling configuration this handler was built with.
    #[must_use]
    pub fn config(&self) -> &ErrorConfig {
        &self.config
    }

    /// Records a served path. The ring keeps the five most recent entries.
    pub fn push_navigation(&self, path: impl Into<String>) {
        let mut stack = self
            .navigation_stack
            .lock()
            .expect("error handler lock poisoned");
        stack.push_back(path.into());
        while stack.len() > NAVIGATION_STACK_LIMIT {
            stack.pop_front();
        }
    }

    /// The recorded paths, oldest first.
    #[must_use]
    pub fn navigation_stack(&self) -> Vec<String> {
        self.navigation_stack
            .lock()
            .expect("error handler lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// The `n` most recently recorded paths, newest first.
    #[must_use]
    pub fn recent_navigations(&self, n: usize) -> Vec<String> {
        self.navigation_stack
            .lock()
            .expect("error handler lock poisoned")
            .iter()
            .rev()
            .take(n)
            .cloned()
            .collect()
    }

    /// The last error that went through [`ErrorHandler::emit_error`].
    #[must_use]
    pub fn last_error(&self) -> Option<AppError> {
        self.last_error
            .lock()
            .expect("error handler lock poisoned")
            .clone()
    }

    /// Wraps a reason into a global error.
    #[must_use]
    pub fn make_global_error(&self, reason: impl Into<FailureReason>) -> AppError {
        self.make_error(AppErrorType::Global, reason.into(), None)
    }

    /// Wraps a reason into a framework error.
    #[must_use]
    pub fn make_framework_error(&self, reason: impl Into<FailureReason>) -> AppError {
        self.make_error(AppErrorType::Framework, reason.into(), None)
    }

    /// Wraps a reason into a network error. The code is taken from the
    /// response status when the reason carries one.
    #[must_use]
    pub fn make_network_error(&self, reason: impl Into<FailureReason>) -> AppError {
        self.make_error(AppErrorType::Network, reason.into(), None)
    }

    /// Wraps a reason into an error scoped to one content element.
    #[must_use]
    pub fn make_content_element_error(
        &self,
        reason: impl Into<FailureReason>,
        element_id: &str,
        definition: serde_json::Value,
    ) -> AppError {
        let error = self.make_error(AppErrorType::ContentElement, reason.into(), None);
        error.set_element_id(element_id);
        error.add_payload("definition", definition);
        error
    }

    /// The generic factory. Passing an [`AppError`] reason returns that very
    /// instance unchanged, so call sites may wrap defensively.
    #[must_use]
    pub fn make_error(
        &self,
        error_type: AppErrorType,
        reason: FailureReason,
        code: Option<u16>,
    ) -> AppError {
        let (message, reason_code) = match reason {
            FailureReason::App(existing) => return existing,
            FailureReason::Message(msg) => (msg, None),
            FailureReason::Bridge(err) => {
                let status = err.status();
                (err.to_string(), status)
            }
        };
        let code = code
            .or(reason_code)
            .unwrap_or(self.config.default_error_code);
        AppError::new(error_type, code, message, self.navigation_stack())
    }

    /// Runs the full handling pipeline for one error: concrete handler,
    /// console print, logger callback. A second call for the same instance
    /// is a no-op.
    pub async fn emit_error(&self, error: AppError) -> Result<()> {
        if !error.try_mark_handled() {
            tracing::debug!(code = error.code(), "error already handled, skipping");
            return Ok(());
        }

        let _guard = self.track();
        let span = tracing::debug_span!(
            "emit_error",
            error_type = %error.error_type(),
            code = error.code()
        );
        let _enter = span.enter();

        *self.last_error.lock().expect("error handler lock poisoned") = Some(error.clone());

        let mut ctx = HandlerContext {
            error: error.clone(),
            config: self.config.clone(),
            flags: HandlerFlags::default(),
        };

        let concrete = self
            .concrete
            .lock()
            .expect("error handler lock poisoned")
            .clone();
        if let Some(concrete) = concrete {
            drop(_enter);
            ctx = concrete(ctx).await;
        }

        if ctx.flags.print_to_console && self.config.print_to_console {
            print_to_console(&error);
        }
        if ctx.flags.send_to_logger {
            if let Some(logger) = &self.config.logger {
                logger(&error);
            }
        }
        Ok(())
    }

    /// Resolves once no error handling is in flight. Used by the
    /// server-rendering path before the response is flushed.
    pub async fn wait_for_all(&self) {
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            // Interest must be registered before the pending check:
            // `notify_waiters` only wakes futures that are already enabled.
            drained.as_mut().enable();
            if *self.pending.lock().expect("error handler lock poisoned") == 0 {
                return;
            }
            drained.await;
        }
    }

    /// A reporting closure scoped to one content element, handed to widget
    /// mounting so per-widget failures stay isolated.
    #[must_use]
    pub fn content_element_scope(
        self: &Arc<Self>,
        element_id: &str,
        definition: serde_json::Value,
    ) -> ContentElementErrorScope {
        ContentElementErrorScope {
            handler: Arc::clone(self),
            element_id: element_id.to_string(),
            definition,
        }
    }

    fn track(&self) -> PendingGuard<'_> {
        *self.pending.lock().expect("error handler lock poisoned") += 1;
        PendingGuard { handler: self }
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("config", &self.config)
            .field("navigation_stack", &self.navigation_stack())
            .finish_non_exhaustive()
    }
}

struct PendingGuard<'a> {
    handler: &'a ErrorHandler,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self
            .handler
            .pending
            .lock()
            .expect("error handler lock poisoned");
        *pending -= 1;
        if *pending == 0 {
            self.handler.drained.notify_waiters();
        }
    }
}

/// Error reporting bound to one hybrid widget.
#[derive(Clone)]
pub struct ContentElementErrorScope {
    handler: Arc<ErrorHandler>,
    element_id: String,
    definition: serde_json::Value,
}

impl ContentElementErrorScope {
    /// Reports a failure of this widget through the central handler.
    pub async fn report(&self, reason: impl Into<FailureReason>) -> Result<()> {
        let error = self.handler.make_content_element_error(
            reason,
            &self.element_id,
            self.definition.clone(),
        );
        self.handler.emit_error(error).await
    }
}

fn print_to_console(error: &AppError) {
    tracing::error!(
        error_type = %error.error_type(),
        code = error.code(),
        message = %error.message(),
        occurred_at = %error.occurred_at(),
        navigation_stack = ?error.navigation_stack(),
        "application error"
    );
}
