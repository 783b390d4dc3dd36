use std::collections::HashMap;
use std::sync::Arc;

use adreel_core::generation::{NewGeneration, Outcome};
use adreel_core::types::GenerationId;
use adreel_events::{EventBus, EVENT_GENERATION_CREATED, EVENT_GENERATION_UPDATED};
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{publish_change, GenerationStore, GenerationWatch, StoreError};
use crate::models::generation::Generation;

/// Process-local store for tests and database-less runs.
///
/// Changes are published while the write lock is held, so the bus sees
/// them in the same order they were applied.
pub struct MemoryGenerationStore {
    records: RwLock<HashMap<GenerationId, Generation>>,
    bus: Arc<EventBus>,
}

impl MemoryGenerationStore {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            bus,
        }
    }
}

#[async_trait]
impl GenerationStore for MemoryGenerationStore {
    async fn insert(&self, input: &NewGeneration) -> Result<Generation, StoreError> {
        let record = Generation::pending(GenerationId::now_v7(), input, chrono::Utc::now());
        let mut records = self.records.write().await;
        records.insert(record.id, record.clone());
        publish_change(&self.bus, EVENT_GENERATION_CREATED, &record)?;
        Ok(record)
    }

    async fn find_by_id(&self, id: GenerationId) -> Result<Option<Generation>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn apply_outcome_if_pending(
        &self,
        id: GenerationId,
        outcome: &Outcome,
    ) -> Result<Option<Generation>, StoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&id) else {
            return Ok(None);
        };
        if record.status.is_terminal() {
            return Ok(None);
        }
        record.apply(outcome);
        let updated = record.clone();
        publish_change(&self.bus, EVENT_GENERATION_UPDATED, &updated)?;
        Ok(Some(updated))
    }

    fn watch(&self, id: GenerationId) -> GenerationWatch {
        GenerationWatch::new(id, &self.bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WatchEvent;
    use adreel_core::generation::{AspectRatio, GenerationStatus, Voice};
    use assert_matches::assert_matches;

    fn input() -> NewGeneration {
        NewGeneration {
            prompt: "Cold brew launch".into(),
            aspect_ratio: AspectRatio::Landscape,
            length: 15,
            voice: Voice::James,
            image_url: Some("https://cdn.example.com/can.png".into()),
        }
    }

    fn store() -> MemoryGenerationStore {
        MemoryGenerationStore::new(Arc::new(EventBus::default()))
    }

    #[tokio::test]
    async fn insert_creates_pending_record() {
        let store = store();
        let record = store.insert(&input()).await.unwrap();

        assert_eq!(record.status, GenerationStatus::Pending);
        assert!(record.video_url.is_none());
        assert!(record.error_message.is_none());
        assert_eq!(store.find_by_id(record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn find_unknown_returns_none() {
        assert!(store().find_by_id(GenerationId::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn outcome_applies_once() {
        let store = store();
        let record = store.insert(&input()).await.unwrap();

        let completed = Outcome::Completed {
            video_url: "https://cdn.example.com/ad.mp4".into(),
        };
        let updated = store
            .apply_outcome_if_pending(record.id, &completed)
            .await
            .unwrap()
            .expect("pending record should accept outcome");
        assert_eq!(updated.status, GenerationStatus::Completed);
        assert_eq!(updated.video_url.as_deref(), Some("https://cdn.example.com/ad.mp4"));
        assert!(updated.error_message.is_none());

        let failed = Outcome::Failed {
            reason: "late failure".into(),
        };
        assert!(store
            .apply_outcome_if_pending(record.id, &failed)
            .await
            .unwrap()
            .is_none());

        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn outcome_on_unknown_id_returns_none() {
        let outcome = Outcome::Failed { reason: "x".into() };
        assert!(store()
            .apply_outcome_if_pending(GenerationId::now_v7(), &outcome)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn watch_sees_only_updates_of_its_record() {
        let store = store();
        let watched = store.insert(&input()).await.unwrap();
        let other = store.insert(&input()).await.unwrap();
        let mut watch = store.watch(watched.id);

        let fail = Outcome::Failed {
            reason: "render farm offline".into(),
        };
        store.apply_outcome_if_pending(other.id, &fail).await.unwrap();
        store.apply_outcome_if_pending(watched.id, &fail).await.unwrap();

        assert_matches!(
            watch.next().await,
            Some(WatchEvent::Changed(record))
                if record.id == watched.id && record.status == GenerationStatus::Failed
        );
    }

    #[tokio::test]
    async fn watch_ends_when_bus_is_dropped() {
        let bus = Arc::new(EventBus::default());
        let store = MemoryGenerationStore::new(Arc::clone(&bus));
        let mut watch = store.watch(GenerationId::now_v7());
        drop(store);
        drop(bus);
        assert!(watch.next().await.is_none());
    }
}
