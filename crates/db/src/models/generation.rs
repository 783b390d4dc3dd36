//! Generation record model.

use adreel_core::generation::{
    AspectRatio, GenerationStatus, GenerationView, NewGeneration, Outcome, Voice,
};
use adreel_core::types::{GenerationId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `generations` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Generation {
    pub id: GenerationId,
    pub prompt: String,
    #[sqlx(try_from = "String")]
    pub aspect_ratio: AspectRatio,
    pub length: i32,
    #[sqlx(try_from = "String")]
    pub voice: Voice,
    pub image_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: GenerationStatus,
    pub video_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

impl Generation {
    /// Build a fresh pending record. Used by stores that assign ids
    /// themselves.
    pub fn pending(id: GenerationId, input: &NewGeneration, created_at: Timestamp) -> Self {
        Self {
            id,
            prompt: input.prompt.clone(),
            aspect_ratio: input.aspect_ratio,
            length: input.length,
            voice: input.voice,
            image_url: input.image_url.clone(),
            status: GenerationStatus::Pending,
            video_url: None,
            error_message: None,
            created_at,
        }
    }

    /// Write an outcome's fields. Callers check the status first.
    pub(crate) fn apply(&mut self, outcome: &Outcome) {
        self.status = outcome.status();
        self.video_url = outcome.video_url().map(str::to_string);
        self.error_message = outcome.error_message().map(str::to_string);
    }

    /// What a watching client should display for this record.
    pub fn view(&self) -> GenerationView {
        GenerationView::resolve(
            self.status,
            self.video_url.as_deref(),
            self.error_message.as_deref(),
        )
    }
}
