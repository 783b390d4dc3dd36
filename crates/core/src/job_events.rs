//! WebSocket message type constants for generation watch sessions.
//!
//! Used in `api/src/engine/tracker.rs` when pushing lifecycle updates to a
//! client watching a single generation.

/// Advisory progress estimate while the generation is pending.
pub const MSG_TYPE_GENERATION_PROGRESS: &str = "generation_progress";

/// Generation completed; carries the video URL.
pub const MSG_TYPE_GENERATION_COMPLETED: &str = "generation_completed";

/// Generation failed, or the identifier is unknown.
pub const MSG_TYPE_GENERATION_FAILED: &str = "generation_failed";
