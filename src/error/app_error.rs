//! The typed failure object of the framework.
//!
//! An [`AppError`] is a shared handle: factories hand the same instance to
//! every interested party, the concrete handler mutates its additional
//! payload while handling is in flight, and the route handler reads values
//! back afterwards. Once marked handled the classification is frozen.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::BridgeError;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppErrorType {
    /// Uncaught script/process errors.
    Global,
    /// Internal bootstrap or composition errors.
    Framework,
    /// Failure scoped to one widget/component instance.
    ContentElement,
    /// Resource-fetch failures.
    Network,
}

impl std::fmt::Display for AppErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Global => "global",
            Self::Framework => "framework",
            Self::ContentElement => "contentElement",
            Self::Network => "network",
        };
        f.write_str(label)
    }
}

/// What caused an error. Factories accept anything convertible into this.
///
/// Passing an existing [`AppError`] makes the factory idempotent: the
/// instance is returned unchanged, its type and code untouched.
#[derive(Debug, Clone)]
pub enum FailureReason {
    /// A plain message.
    Message(String),
    /// A framework plumbing error.
    Bridge(BridgeError),
    /// An already-created app error.
    App(AppError),
}

impl From<&str> for FailureReason {
    fn from(msg: &str) -> Self {
        Self::Message(msg.to_string())
    }
}

impl From<String> for FailureReason {
    fn from(msg: String) -> Self {
        Self::Message(msg)
    }
}

impl From<BridgeError> for FailureReason {
    fn from(err: BridgeError) -> Self {
        Self::Bridge(err)
    }
}

impl From<AppError> for FailureReason {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

#[derive(Debug)]
struct AppErrorState {
    error_type: AppErrorType,
    code: u16,
    message: String,
    additional_payload: Map<String, Value>,
    navigation_stack: Vec<String>,
    element_id: Option<String>,
    handled: bool,
}

/// A classified, routable failure.
///
/// Cloning produces another handle to the same error; identity is therefore
/// pointer identity (see [`AppError::same_instance`]).
#[derive(Debug, Clone)]
pub struct AppError {
    state: Arc<Mutex<AppErrorState>>,
    occurred_at: DateTime<Utc>,
}

impl AppError {
    /// Creates a new error. Prefer the `ErrorHandler::make_*` factories,
    /// which fill in code defaults and the navigation stack snapshot.
    #[must_use]
    pub fn new(
        error_type: AppErrorType,
        code: u16,
        message: impl Into<String>,
        navigation_stack: Vec<String>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppErrorState {
                error_type,
                code,
                message: message.into(),
                additional_payload: Map::new(),
                navigation_stack,
                element_id: None,
                handled: false,
            })),
            occurred_at: Utc::now(),
        }
    }

    /// The type key of this error.
    #[must_use]
    pub fn error_type(&self) -> AppErrorType {
        self.lock().error_type
    }

    /// The error code, HTTP-style. 500 by default.
    #[must_use]
    pub fn code(&self) -> u16 {
        self.lock().code
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> String {
        self.lock().message.clone()
    }

    /// When the error object was created.
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// True once the error went through `emit_error`.
    #[must_use]
    pub fn is_handled(&self) -> bool {
        self.lock().handled
    }

    /// Marks the error handled. Returns `false` if it already was, which is
    /// what guards double-handling from concurrent call sites.
    pub(crate) fn try_mark_handled(&self) -> bool {
        let mut state = self.lock();
        if state.handled {
            return false;
        }
        state.handled = true;
        true
    }

    /// Updates the error code. Ignored once the error is handled.
    pub fn set_code(&self, code: u16) {
        let mut state = self.lock();
        if !state.handled {
            state.code = code;
        }
    }

    /// The paths served shortly before this error was created (at most five).
    #[must_use]
    pub fn navigation_stack(&self) -> Vec<String> {
        self.lock().navigation_stack.clone()
    }

    /// The content element this error is scoped to, if any.
    #[must_use]
    pub fn element_id(&self) -> Option<String> {
        self.lock().element_id.clone()
    }

    /// Scopes the error to a content element.
    pub fn set_element_id(&self, id: impl Into<String>) {
        self.lock().element_id = Some(id.into());
    }

    /// Additional debugging payload attached to the error.
    #[must_use]
    pub fn additional_payload(&self) -> Map<String, Value> {
        self.lock().additional_payload.clone()
    }

    /// A single additional-payload field.
    #[must_use]
    pub fn payload_value(&self, key: &str) -> Option<Value> {
        self.lock().additional_payload.get(key).cloned()
    }

    /// Adds one additional-payload field. Unlike the classification this
    /// stays writable after handling so concrete handlers can pass values
    /// back to their caller (e.g. `routerNextValue`).
    pub fn add_payload(&self, key: &str, value: Value) {
        self.lock()
            .additional_payload
            .insert(key.to_string(), value);
    }

    /// Merges several additional-payload fields at once.
    pub fn merge_payload(&self, payload: Map<String, Value>) {
        let mut state = self.lock();
        for (key, value) in payload {
            state.additional_payload.insert(key, value);
        }
    }

    /// True if both handles refer to the same error instance.
    #[must_use]
    pub fn same_instance(&self, other: &AppError) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AppErrorState> {
        self.state.lock().expect("app error lock poisoned")
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        write!(
            f,
            "{} error ({}): {}",
            state.error_type, state.code, state.message
        )
    }
}
