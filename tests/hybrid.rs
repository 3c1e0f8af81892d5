//! Hybrid bootstrap against mocked markup and renderer.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use pagebridge::domain::Collection;
use pagebridge::event::names::{
    EVENT_CONTENT_ELEMENT_LOADED, HOOK_CONTENT_ELEMENT_DEFINITION_FILTER,
};
use pagebridge::event::ListenerFuture;
use pagebridge::render::{ComponentRef, ElementHandle, MarkupDocument, RenderNode, Renderer};
use pagebridge::store::keys::APP_FAILED_CONTENT_ELEMENTS;
use pagebridge::{
    boot_hybrid, AppConfig, BridgeError, Environment, ExecutionSide, FrameworkRuntime,
    HostBindings, Resource, ResourceClient, ResourceQuery, Result,
};

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

/// Server-rendered document stub: a fixed list of marked elements.
struct StaticDocument {
    elements: Vec<ElementHandle>,
}

impl StaticDocument {
    fn with_definitions(definitions: Vec<(&str, &str)>) -> Self {
        let elements = definitions
            .into_iter()
            .map(|(id, definition)| {
                let mut attributes = BTreeMap::new();
                attributes.insert("data-content-element".to_string(), definition.to_string());
                ElementHandle {
                    id: id.to_string(),
                    attributes,
                }
            })
            .collect();
        Self { elements }
    }
}

impl MarkupDocument for StaticDocument {
    fn select(&self, selector: &str) -> Vec<ElementHandle> {
        assert_eq!(selector, "[data-content-element]");
        self.elements.clone()
    }
}

/// Renderer stub recording every mount, optionally failing for one mount
/// point.
#[derive(Default)]
struct RecordingRenderer {
    mounts: Mutex<Vec<(RenderNode, String)>>,
    fail_for: Option<String>,
}

impl Renderer for RecordingRenderer {
    fn mount(&self, node: &RenderNode, mount_point: &str) -> Result<()> {
        if self.fail_for.as_deref() == Some(mount_point) {
            return Err(BridgeError::Render(format!(
                "renderer rejected mount at {mount_point}"
            )));
        }
        self.mounts
            .lock()
            .unwrap()
            .push((node.clone(), mount_point.to_string()));
        Ok(())
    }
}

fn base_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = Some(Environment::Production);
    config.execution_side = Some(ExecutionSide::Client);
    config
}

fn bindings_for(
    document: StaticDocument,
    renderer: Arc<RecordingRenderer>,
) -> HostBindings {
    let mut bindings = HostBindings::new(Arc::new(NullClient));
    bindings.document = Some(Arc::new(document));
    bindings.renderer = Some(renderer as Arc<dyn Renderer>);
    bindings
}

#[tokio::test]
async fn widgets_are_discovered_and_mounted_with_flattened_definitions() {
    let document = StaticDocument::with_definitions(vec![
        (
            "ce-1",
            r#"{"data": {"id": "ce-1", "attributes": {"type": "teaser", "header": "Hi"}}}"#,
        ),
        ("ce-2", r#"{"type": "gallery"}"#),
    ]);
    let renderer = Arc::new(RecordingRenderer::default());
    let runtime = FrameworkRuntime::new();

    let (_app, children) = boot_hybrid(
        &runtime,
        base_config(),
        bindings_for(document, Arc::clone(&renderer)),
    )
    .await
    .unwrap();

    assert_eq!(children.len(), 2);
    let mounts = renderer.mounts.lock().unwrap().clone();
    assert_eq!(mounts.len(), 2);

    let (node, mount_point) = &mounts[0];
    assert_eq!(mount_point, "ce-1");
    assert_eq!(node.component, ComponentRef::new("content-element"));
    assert_eq!(
        node.props.get("definition"),
        Some(&json!({"id": "ce-1", "type": "teaser", "header": "Hi"}))
    );

    let (node, mount_point) = &mounts[1];
    assert_eq!(mount_point, "ce-2");
    assert_eq!(node.props.get("definition"), Some(&json!({"type": "gallery"})));
}

#[tokio::test]
async fn the_definition_filter_hook_rewrites_widget_definitions() {
    let document =
        StaticDocument::with_definitions(vec![("ce-1", r#"{"type": "teaser"}"#)]);
    let renderer = Arc::new(RecordingRenderer::default());
    let runtime = FrameworkRuntime::new();

    let mut config = base_config();
    config.events.push(pagebridge::config::EventBinding {
        event: HOOK_CONTENT_ELEMENT_DEFINITION_FILTER.to_string(),
        listener: Arc::new(|mut payload| {
            Box::pin(async move {
                let mut definition = payload.get("definition").cloned().unwrap_or(Value::Null);
                if let Some(map) = definition.as_object_mut() {
                    map.insert("injected".to_string(), json!(true));
                }
                payload.set("definition", definition);
                Ok(payload)
            }) as ListenerFuture
        }),
    });

    boot_hybrid(
        &runtime,
        config,
        bindings_for(document, Arc::clone(&renderer)),
    )
    .await
    .unwrap();

    let mounts = renderer.mounts.lock().unwrap().clone();
    assert_eq!(
        mounts[0].0.props.get("definition"),
        Some(&json!({"type": "teaser", "injected": true}))
    );
}

#[tokio::test]
async fn an_invalid_definition_does_not_take_down_its_siblings() {
    let document = StaticDocument::with_definitions(vec![
        ("ce-broken", "{not json"),
        ("ce-ok", r#"{"type": "teaser"}"#),
    ]);
    let renderer = Arc::new(RecordingRenderer::default());
    let runtime = FrameworkRuntime::new();

    let (app, children) = boot_hybrid(
        &runtime,
        base_config(),
        bindings_for(document, Arc::clone(&renderer)),
    )
    .await
    .unwrap();

    // Both widgets keep their derived contexts, but only one mounted.
    assert_eq!(children.len(), 2);
    let mounts = renderer.mounts.lock().unwrap().clone();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].1, "ce-ok");

    let failed = app.store().get(APP_FAILED_CONTENT_ELEMENTS, json!({}));
    assert_eq!(failed, json!({"ce-broken": true}));

    let error = app.error_handler().last_error().unwrap();
    assert_eq!(error.element_id().as_deref(), Some("ce-broken"));
}

#[tokio::test]
async fn a_failing_renderer_flags_only_the_affected_widget() {
    let document = StaticDocument::with_definitions(vec![
        ("ce-1", r#"{"type": "teaser"}"#),
        ("ce-2", r#"{"type": "gallery"}"#),
    ]);
    let renderer = Arc::new(RecordingRenderer {
        mounts: Mutex::new(Vec::new()),
        fail_for: Some("ce-1".to_string()),
    });
    let runtime = FrameworkRuntime::new();

    let (app, _children) = boot_hybrid(
        &runtime,
        base_config(),
        bindings_for(document, Arc::clone(&renderer)),
    )
    .await
    .unwrap();

    let mounts = renderer.mounts.lock().unwrap().clone();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].1, "ce-2");

    let failed = app.store().get(APP_FAILED_CONTENT_ELEMENTS, json!({}));
    assert_eq!(failed, json!({"ce-1": true}));
    // The failed widget's error keeps its parsed definition for diagnosis.
    let error = app.error_handler().last_error().unwrap();
    assert_eq!(
        error.payload_value("definition"),
        Some(json!({"type": "teaser"}))
    );
}

#[tokio::test]
async fn loaded_events_fire_once_per_mounted_widget() {
    let document = StaticDocument::with_definitions(vec![
        ("ce-1", r#"{"type": "teaser"}"#),
        ("ce-2", r#"{"type": "gallery"}"#),
    ]);
    let renderer = Arc::new(RecordingRenderer::default());
    let runtime = FrameworkRuntime::new();

    let loaded: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&loaded);
    let mut config = base_config();
    config.events.push(pagebridge::config::EventBinding {
        event: EVENT_CONTENT_ELEMENT_LOADED.to_string(),
        listener: Arc::new(move |payload| {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                if let Some(id) = payload.get("elementId").and_then(Value::as_str) {
                    sink.lock().unwrap().push(id.to_string());
                }
                Ok(payload)
            }) as ListenerFuture
        }),
    });

    boot_hybrid(
        &runtime,
        config,
        bindings_for(document, Arc::clone(&renderer)),
    )
    .await
    .unwrap();

    assert_eq!(loaded.lock().unwrap().clone(), vec!["ce-1", "ce-2"]);
}

#[tokio::test]
async fn global_data_translations_are_installed_and_activated() {
    let document = StaticDocument::with_definitions(vec![("ce-1", r#"{"type": "teaser"}"#)]);
    let renderer = Arc::new(RecordingRenderer::default());
    let runtime = FrameworkRuntime::new();

    let mut bindings = bindings_for(document, renderer);
    bindings.global_data = Some(json!({
        "translations": {"id": "de", "message": {"greeting": "Hallo"}}
    }));

    let (app, children) = boot_hybrid(&runtime, base_config(), bindings)
        .await
        .unwrap();

    assert_eq!(app.translation().language_code(), "de");
    assert_eq!(
        app.translation().translate("greeting").as_deref(),
        Some("Hallo")
    );
    // Derived widget contexts share the same translation service.
    assert_eq!(children[0].translation().language_code(), "de");
}

#[tokio::test]
async fn derived_contexts_share_the_parent_store() {
    let document = StaticDocument::with_definitions(vec![("ce-1", r#"{"type": "teaser"}"#)]);
    let renderer = Arc::new(RecordingRenderer::default());
    let runtime = FrameworkRuntime::new();

    let (app, children) = boot_hybrid(
        &runtime,
        base_config(),
        bindings_for(document, renderer),
    )
    .await
    .unwrap();

    app.store().set("shared", json!(1));
    assert_eq!(children[0].store().get("shared", json!(null)), json!(1));
}
