//! Navigation and state-synchronization core between a headless CMS and a
//! component-tree renderer.
//!
//! The crate glues three opaque collaborators together without owning any of
//! them: a backend resource API (behind [`api::ResourceClient`]), a host
//! router, and a renderer that turns declarative [`render::RenderNode`]
//! trees into UI. What it does own is everything in between:
//!
//! - a reactive key/value [`store`] all subsystems share,
//! - an ordered, asynchronous [`event`] bus with mutation-passing hook
//!   pipelines,
//! - the [`routing`] core that fetches page state per navigation, executes
//!   out-of-band server instructions and commits results,
//! - central [`error`] classification, routing and logging,
//! - the [`context`] graph (application, page, render) and the ancillary
//!   page [`modules`] (metadata, pids, links, translations),
//! - explicit [`bootstrap`] sequences for the two application modes: a full
//!   SPA, or hybrid widgets hydrated into server-rendered markup.
//!
//! # Architecture
//!
//! All cross-cutting extension happens through named hooks on the event bus;
//! the boot sequences and the route handler emit them in a documented,
//! fixed order. State flows one way: backend response, then hook pipeline,
//! then store commit, then watchers. UI concerns stay behind the narrow
//! traits in [`render`], so the core is renderer-agnostic and testable
//! without a DOM or HTTP stack.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod event;
pub mod modules;
pub mod observability;
pub mod render;
pub mod routing;
pub mod store;

pub use api::{Include, RequestDecorator, RequestDeduper, ResourceClient, ResourceQuery};
pub use bootstrap::{boot_hybrid, boot_spa, FrameworkRuntime, HostBindings};
pub use config::{AppConfig, AppMode, Environment, ExecutionSide};
pub use context::{AppContext, PageContext, RenderContext};
pub use domain::{BridgeError, Collection, Resource, ResponseMeta, Result, Route};
pub use error::{AppError, AppErrorType, ErrorHandler};
pub use event::{EventBus, HookPayload};
pub use routing::{NavigationDecision, NavigationStage, RouteHandler};
pub use store::Store;
