pub mod generation;
pub mod health;
pub mod job;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /job                                GET read, POST submit (workflow proxy)
///
/// /generations                        create (POST)
/// /generations/{id}                   get
/// /generations/{id}/complete          record completion (POST)
/// /generations/{id}/fail              record failure (POST)
///
/// /ws/generations/{id}                WebSocket watch session
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/job", job::router())
        .nest("/generations", generation::router())
        .route("/ws/generations/{id}", get(ws::ws_handler))
}
