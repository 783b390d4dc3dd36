//! Adreel domain core.
//!
//! Pure types and rules shared by every other crate: identifiers, the
//! domain error type, generation enums and input validation, the
//! lifecycle transition rules, the client-side progress estimator, and
//! the WebSocket message type constants. Nothing in here performs I/O.

pub mod error;
pub mod generation;
pub mod job_events;
pub mod progress;
pub mod types;
