//! Repository for the `generations` table.
//!
//! Status literals come from [`GenerationStatus::as_str`]; outcome writes
//! are conditional on `status = 'pending'` so concurrent writers race
//! safely inside Postgres.

use adreel_core::generation::{GenerationStatus, NewGeneration, Outcome};
use adreel_core::types::GenerationId;
use sqlx::PgPool;

use crate::models::generation::Generation;

/// Column list for `generations` queries.
const COLUMNS: &str = "\
    id, prompt, aspect_ratio, length, voice, image_url, \
    status, video_url, error_message, created_at";

/// Provides CRUD operations for generation records.
pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a new pending record with the given id.
    pub async fn insert(
        pool: &PgPool,
        id: GenerationId,
        input: &NewGeneration,
    ) -> Result<Generation, sqlx::Error> {
        let query = format!(
            "INSERT INTO generations (id, prompt, aspect_ratio, length, voice, image_url, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(id)
            .bind(&input.prompt)
            .bind(input.aspect_ratio.as_str())
            .bind(input.length)
            .bind(input.voice.as_str())
            .bind(&input.image_url)
            .bind(GenerationStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    /// Point read by id.
    pub async fn find_by_id(
        pool: &PgPool,
        id: GenerationId,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE id = $1");
        sqlx::query_as::<_, Generation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Record a terminal outcome if the row is still pending.
    ///
    /// Returns the updated row, or `None` when the row is missing or
    /// already terminal.
    pub async fn apply_outcome(
        pool: &PgPool,
        id: GenerationId,
        outcome: &Outcome,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!(
            "UPDATE generations \
             SET status = $2, video_url = $3, error_message = $4 \
             WHERE id = $1 AND status = $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(id)
            .bind(outcome.status().as_str())
            .bind(outcome.video_url())
            .bind(outcome.error_message())
            .bind(GenerationStatus::Pending.as_str())
            .fetch_optional(pool)
            .await
    }
}
