use std::sync::Arc;

use adreel_workflow::WorkflowProxy;

use crate::config::ServerConfig;
use crate::engine::GenerationLifecycle;
use crate::notifications::StatusNotifier;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Generation state machine over the record store.
    pub lifecycle: Arc<GenerationLifecycle>,
    /// Per-generation change subscriptions for watch sessions.
    pub notifier: Arc<StatusNotifier>,
    /// Start/resume proxy in front of the workflow engine.
    pub proxy: Arc<WorkflowProxy>,
    /// WebSocket connection manager (watching clients).
    pub ws_manager: Arc<WsManager>,
}
