//! The record store seam.
//!
//! [`GenerationStore`] is the only way the rest of the system touches
//! generation records: create, point read, a conditional outcome write,
//! and a per-id change feed. Atomicity of the outcome write is the
//! store's job; nothing above it takes locks.

pub mod memory;
pub mod postgres;

use adreel_core::generation::{NewGeneration, Outcome};
use adreel_core::types::GenerationId;
use adreel_events::{EventBus, PlatformEvent};
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::models::generation::Generation;

/// Errors raised by a record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing database failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record could not be encoded for the change feed.
    #[error("Record encoding error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Durable keyed storage for generation records.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Persist a new pending record and assign its id.
    async fn insert(&self, input: &NewGeneration) -> Result<Generation, StoreError>;

    /// Point read by id.
    async fn find_by_id(&self, id: GenerationId) -> Result<Option<Generation>, StoreError>;

    /// Atomically record `outcome` if the record is still pending.
    ///
    /// Returns the updated record when the write happened, `None` when the
    /// record is missing or already terminal. A successful write is
    /// published to every [`GenerationWatch`] on that id.
    async fn apply_outcome_if_pending(
        &self,
        id: GenerationId,
        outcome: &Outcome,
    ) -> Result<Option<Generation>, StoreError>;

    /// Subscribe to updates of a single record.
    ///
    /// The watch only sees changes published after this call returns, so
    /// callers that also need the current state should watch first and
    /// read second.
    fn watch(&self, id: GenerationId) -> GenerationWatch;
}

// ---------------------------------------------------------------------------
// Change feed
// ---------------------------------------------------------------------------

/// One item from a [`GenerationWatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The record changed; carries its new state.
    Changed(Generation),
    /// The watcher fell behind and `n` bus events were dropped. The
    /// current state should be re-read from the store.
    Lagged(u64),
}

/// Update feed for a single generation id, in the order the store applied
/// them.
pub struct GenerationWatch {
    id: GenerationId,
    receiver: broadcast::Receiver<PlatformEvent>,
}

impl GenerationWatch {
    pub fn new(id: GenerationId, bus: &EventBus) -> Self {
        Self {
            id,
            receiver: bus.subscribe(),
        }
    }

    pub fn id(&self) -> GenerationId {
        self.id
    }

    /// Wait for the next update of this record.
    ///
    /// Returns `None` once the event bus has been dropped.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.is_update_of(self.id) => {
                    match serde_json::from_value::<Generation>(event.payload) {
                        Ok(record) => return Some(WatchEvent::Changed(record)),
                        Err(e) => {
                            tracing::warn!(
                                generation_id = %self.id,
                                error = %e,
                                "Skipping undecodable generation change",
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Some(WatchEvent::Lagged(n));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Publish a record change on the bus.
pub(crate) fn publish_change(
    bus: &EventBus,
    event_type: &str,
    record: &Generation,
) -> Result<(), StoreError> {
    let payload = serde_json::to_value(record)?;
    bus.publish(PlatformEvent::generation(event_type, record.id, payload));
    Ok(())
}
