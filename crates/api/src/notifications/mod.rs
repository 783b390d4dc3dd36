//! Push-based status distribution to watching clients.

pub mod status;

pub use status::{StatusEvent, StatusNotifier, StatusSink, SubscriptionHandle};
