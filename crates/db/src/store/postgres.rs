use std::sync::Arc;

use adreel_core::generation::{NewGeneration, Outcome};
use adreel_core::types::GenerationId;
use adreel_events::{EventBus, EVENT_GENERATION_CREATED, EVENT_GENERATION_UPDATED};
use async_trait::async_trait;

use super::{publish_change, GenerationStore, GenerationWatch, StoreError};
use crate::models::generation::Generation;
use crate::repositories::GenerationRepo;
use crate::DbPool;

/// Postgres-backed store. Writes go through [`GenerationRepo`]; every
/// successful write is then published on the event bus.
pub struct PgGenerationStore {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl PgGenerationStore {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }
}

#[async_trait]
impl GenerationStore for PgGenerationStore {
    async fn insert(&self, input: &NewGeneration) -> Result<Generation, StoreError> {
        let record = GenerationRepo::insert(&self.pool, GenerationId::now_v7(), input).await?;
        publish_change(&self.bus, EVENT_GENERATION_CREATED, &record)?;
        Ok(record)
    }

    async fn find_by_id(&self, id: GenerationId) -> Result<Option<Generation>, StoreError> {
        Ok(GenerationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn apply_outcome_if_pending(
        &self,
        id: GenerationId,
        outcome: &Outcome,
    ) -> Result<Option<Generation>, StoreError> {
        let updated = GenerationRepo::apply_outcome(&self.pool, id, outcome).await?;
        if let Some(record) = &updated {
            publish_change(&self.bus, EVENT_GENERATION_UPDATED, record)?;
        }
        Ok(updated)
    }

    fn watch(&self, id: GenerationId) -> GenerationWatch {
        GenerationWatch::new(id, &self.bus)
    }
}
