//! Shared response envelope types for API handlers.
//!
//! Generation responses use a `{ "data": ... }` envelope. The `/job` proxy
//! routes return the workflow envelope unwrapped.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
