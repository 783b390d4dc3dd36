/// Generation identifiers are opaque UUIDs assigned by the record store.
pub type GenerationId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
