//! Adreel in-process event bus.
//!
//! - [`EventBus`]: publish/subscribe hub backed by
//!   `tokio::sync::broadcast`. The record store publishes every
//!   generation change here; the status notifier consumes it.
//! - [`PlatformEvent`]: the canonical domain event envelope.

pub mod bus;

pub use bus::{EventBus, PlatformEvent, EVENT_GENERATION_CREATED, EVENT_GENERATION_UPDATED};
