//! Handlers for the `/job` proxy resource.
//!
//! Both verbs hand the call to the [`WorkflowProxy`](adreel_workflow::WorkflowProxy)
//! and return its envelope as-is. A call that got no upstream reply
//! becomes HTTP 500 with `{ "error": ... }`.

use adreel_workflow::{ProxyReply, SubmitBody};
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

/// Query parameters shared by both verbs.
///
/// The pointer may arrive as `resume` or as `resumeUrl`. When both carry
/// a value, `resume` wins.
#[derive(Debug, Default, Deserialize)]
pub struct JobQuery {
    /// Resume pointer previously returned by the workflow engine.
    pub resume: Option<String>,
    #[serde(rename = "resumeUrl")]
    pub resume_url: Option<String>,
}

impl JobQuery {
    /// The resume pointer, ignoring empty values.
    fn pointer(&self) -> Option<&str> {
        [&self.resume, &self.resume_url].into_iter().find_map(|value| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|pointer| !pointer.is_empty())
        })
    }
}

/// GET /api/v1/job?resume=<url>
pub async fn read_job(
    State(state): State<AppState>,
    query: Result<Query<JobQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return query_rejected(rejection),
    };
    reply_response(state.proxy.read(query.pointer()).await)
}

/// POST /api/v1/job?resume=<url>
///
/// The body is forwarded untouched. Its `Content-Type` decides whether it
/// travels as multipart or as a raw buffer, and is passed on as received.
pub async fn submit_job(
    State(state): State<AppState>,
    query: Result<Query<JobQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return query_rejected(rejection),
    };
    let body = SubmitBody::from_inbound(headers.get(CONTENT_TYPE).cloned(), body.to_vec());

    reply_response(state.proxy.submit(query.pointer(), body).await)
}

fn query_rejected(rejection: QueryRejection) -> Response {
    tracing::debug!(error = %rejection, "Rejected job query string");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": rejection.body_text() })),
    )
        .into_response()
}

fn reply_response(reply: ProxyReply) -> Response {
    match reply {
        ProxyReply::Envelope(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
        ProxyReply::Failure(failure) => {
            let status = StatusCode::from_u16(failure.status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(failure)).into_response()
        }
    }
}
