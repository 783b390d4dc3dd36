//! Handlers for the `/generations` resource.
//!
//! Creation and reads are for the submitting client. The `complete` and
//! `fail` callbacks are how the workflow engine (or the client acting on
//! a proxy envelope) records the outcome; repeating one is harmless and
//! reported as `duplicate`.
//!
//! Path and body rejections become
//! [`AppError::BadRequest`](crate::error::AppError::BadRequest), so every
//! failure here has the same `{error, code}` shape.

use adreel_core::generation::{GenerationRequest, TransitionOutcome};
use adreel_core::types::GenerationId;
use adreel_db::models::generation::Generation;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /generations/{id}/complete`.
#[derive(Debug, Deserialize)]
pub struct CompleteGeneration {
    pub video_url: String,
}

/// Body of `POST /generations/{id}/fail`.
#[derive(Debug, Deserialize)]
pub struct FailGeneration {
    pub error_message: String,
}

/// Result of an outcome callback.
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub outcome: TransitionOutcome,
    pub generation: Generation,
}

/// POST /api/v1/generations
///
/// Validate and persist a new pending generation. Returns 201.
pub async fn create_generation(
    State(state): State<AppState>,
    input: Result<Json<GenerationRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = input?;
    let generation = state.lifecycle.create(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: generation })))
}

/// GET /api/v1/generations/{id}
pub async fn get_generation(
    State(state): State<AppState>,
    id: Result<Path<GenerationId>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(id) = id?;
    let generation = state.lifecycle.get(id).await?;
    Ok(Json(DataResponse { data: generation }))
}

/// POST /api/v1/generations/{id}/complete
pub async fn complete_generation(
    State(state): State<AppState>,
    id: Result<Path<GenerationId>, PathRejection>,
    input: Result<Json<CompleteGeneration>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let (Path(id), Json(input)) = (id?, input?);
    let (outcome, generation) = state.lifecycle.mark_completed(id, input.video_url).await?;
    Ok(Json(DataResponse {
        data: TransitionResponse {
            outcome,
            generation,
        },
    }))
}

/// POST /api/v1/generations/{id}/fail
pub async fn fail_generation(
    State(state): State<AppState>,
    id: Result<Path<GenerationId>, PathRejection>,
    input: Result<Json<FailGeneration>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let (Path(id), Json(input)) = (id?, input?);
    let (outcome, generation) = state.lifecycle.mark_failed(id, input.error_message).await?;
    Ok(Json(DataResponse {
        data: TransitionResponse {
            outcome,
            generation,
        },
    }))
}
