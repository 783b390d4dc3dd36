//! Generation state machine.
//!
//! The only writer of a record's `status`, `video_url` and
//! `error_message`. Creation validates input before any store write.
//! Outcomes are applied through the store's conditional update, so two
//! racing callbacks resolve to one `Applied` and one `Duplicate`.

use std::sync::Arc;

use adreel_core::error::CoreError;
use adreel_core::generation::{
    evaluate_transition, GenerationRequest, LengthBounds, Outcome, TransitionOutcome,
};
use adreel_core::types::GenerationId;
use adreel_db::models::generation::Generation;
use adreel_db::{GenerationStore, StoreError};

use crate::error::AppResult;

const ENTITY: &str = "Generation";

pub struct GenerationLifecycle {
    store: Arc<dyn GenerationStore>,
    bounds: LengthBounds,
}

impl GenerationLifecycle {
    pub fn new(store: Arc<dyn GenerationStore>, bounds: LengthBounds) -> Self {
        Self { store, bounds }
    }

    /// Validate and persist a new pending record.
    pub async fn create(&self, request: GenerationRequest) -> AppResult<Generation> {
        let input = request.validate_with(&self.bounds)?;
        let record = self.store.insert(&input).await?;

        tracing::info!(
            generation_id = %record.id,
            aspect_ratio = %record.aspect_ratio,
            length = record.length,
            voice = %record.voice,
            "Generation created",
        );
        Ok(record)
    }

    /// Point read that treats a missing record as `NotFound`.
    pub async fn get(&self, id: GenerationId) -> AppResult<Generation> {
        let record = self.find(id).await?.ok_or(CoreError::NotFound {
            entity: ENTITY,
            id,
        })?;
        Ok(record)
    }

    pub async fn find(&self, id: GenerationId) -> Result<Option<Generation>, StoreError> {
        self.store.find_by_id(id).await
    }

    /// `pending -> completed`. A no-op on terminal records.
    pub async fn mark_completed(
        &self,
        id: GenerationId,
        video_url: impl Into<String>,
    ) -> AppResult<(TransitionOutcome, Generation)> {
        self.transition(
            id,
            Outcome::Completed {
                video_url: video_url.into(),
            },
        )
        .await
    }

    /// `pending -> failed`. A no-op on terminal records.
    pub async fn mark_failed(
        &self,
        id: GenerationId,
        reason: impl Into<String>,
    ) -> AppResult<(TransitionOutcome, Generation)> {
        self.transition(
            id,
            Outcome::Failed {
                reason: reason.into(),
            },
        )
        .await
    }

    async fn transition(
        &self,
        id: GenerationId,
        outcome: Outcome,
    ) -> AppResult<(TransitionOutcome, Generation)> {
        outcome.validate()?;

        if let Some(updated) = self.store.apply_outcome_if_pending(id, &outcome).await? {
            tracing::info!(generation_id = %id, status = %updated.status, "Generation transitioned");
            return Ok((TransitionOutcome::Applied, updated));
        }

        // Zero rows updated: either the record is missing or it is terminal.
        let current = self.get(id).await?;
        match evaluate_transition(current.status) {
            TransitionOutcome::Duplicate => {
                tracing::debug!(
                    generation_id = %id,
                    status = %current.status,
                    requested = %outcome.status(),
                    "Ignoring duplicate transition",
                );
                Ok((TransitionOutcome::Duplicate, current))
            }
            TransitionOutcome::Applied => Err(CoreError::Conflict(format!(
                "Generation {id} is pending but rejected the outcome"
            ))
            .into()),
        }
    }
}
