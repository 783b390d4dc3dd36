//! Route definitions for the `/generations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes mounted at `/generations`.
///
/// ```text
/// POST   /                -> create_generation
/// GET    /{id}            -> get_generation
/// POST   /{id}/complete   -> complete_generation
/// POST   /{id}/fail       -> fail_generation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(generation::create_generation))
        .route("/{id}", get(generation::get_generation))
        .route("/{id}/complete", post(generation::complete_generation))
        .route("/{id}/fail", post(generation::fail_generation))
}
