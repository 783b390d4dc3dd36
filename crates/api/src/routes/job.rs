//! Route definitions for the `/job` proxy resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;

use crate::handlers::job;
use crate::state::AppState;

/// Largest job submit body accepted (multipart uploads included).
pub const MAX_SUBMIT_BYTES: usize = 50 * 1024 * 1024;

/// Routes mounted at `/job`.
///
/// ```text
/// GET    /?resume=<url>   -> read_job
/// POST   /?resume=<url>   -> submit_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(job::read_job).post(job::submit_job))
        .layer(DefaultBodyLimit::max(MAX_SUBMIT_BYTES))
}
