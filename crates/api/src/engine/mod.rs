//! Generation lifecycle orchestration.
//!
//! [`GenerationLifecycle`] owns record transitions; [`tracker`] runs the
//! per-client watch session that combines status pushes with the
//! progress estimator.

pub mod lifecycle;
pub mod tracker;

pub use lifecycle::GenerationLifecycle;
pub use tracker::{SessionEnd, WatchMessage, WatchSession};
