#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adreel_api::config::ServerConfig;
use adreel_api::engine::GenerationLifecycle;
use adreel_api::notifications::StatusNotifier;
use adreel_api::router::build_app_router;
use adreel_api::state::AppState;
use adreel_api::ws::WsManager;
use adreel_core::generation::LengthBounds;
use adreel_db::MemoryGenerationStore;
use adreel_events::EventBus;
use adreel_workflow::{RawResponse, TransportError, WorkflowProxy, WorkflowTransport};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use reqwest::header::HeaderMap;
use reqwest::Method;
use tower::ServiceExt;

pub const START_URL: &str = "https://engine.example.com/webhook/ad-generator";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        workflow_webhook_url: START_URL.to_string(),
        workflow_timeout_secs: 5,
        length_bounds: LengthBounds::default(),
        progress_tick: Duration::from_millis(10),
        database_url: None,
    }
}

// ---------------------------------------------------------------------------
// Scripted workflow engine
// ---------------------------------------------------------------------------

/// One outbound call as the engine saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub target: String,
    pub method: Method,
    pub body: Option<Vec<u8>>,
    pub headers: HeaderMap,
}

/// Fake engine that replays queued replies and records every call.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn reply(&self, status: u16, body: &str) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(RawResponse::new(status, body)));
        self
    }

    pub fn fail(&self, err: TransportError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowTransport for ScriptedTransport {
    async fn call(
        &self,
        target: &str,
        method: Method,
        body: Option<Vec<u8>>,
        headers: HeaderMap,
    ) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            target: target.to_string(),
            method,
            body,
            headers,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("no scripted reply".into())))
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// A router plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub transport: Arc<ScriptedTransport>,
    pub lifecycle: Arc<GenerationLifecycle>,
    pub notifier: Arc<StatusNotifier>,
}

/// Build the full application router over the in-memory store and a
/// scripted workflow engine, with the production middleware stack.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let bus = Arc::new(EventBus::default());
    let store = Arc::new(MemoryGenerationStore::new(bus));
    let transport = Arc::new(ScriptedTransport::default());

    let lifecycle = Arc::new(GenerationLifecycle::new(store.clone(), config.length_bounds));
    let notifier = Arc::new(StatusNotifier::new(store));
    let proxy = Arc::new(WorkflowProxy::new(
        transport.clone(),
        config.workflow_webhook_url.clone(),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        lifecycle: Arc::clone(&lifecycle),
        notifier: Arc::clone(&notifier),
        proxy,
        ws_manager: Arc::new(WsManager::new()),
    };

    TestApp {
        router: build_app_router(state, &config),
        transport,
        lifecycle,
        notifier,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post_json(app: &TestApp, uri: &str, json: serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_bytes(
    app: &TestApp,
    uri: &str,
    content_type: Option<&str>,
    bytes: Vec<u8>,
) -> Response<Body> {
    let mut builder = Request::post(uri);
    if let Some(ct) = content_type {
        builder = builder.header("content-type", ct);
    }
    send(app, builder.body(Body::from(bytes)).unwrap()).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
