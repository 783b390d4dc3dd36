//! Normalized replies from the workflow engine.
//!
//! Every proxy call yields a [`ProxyReply`]: either a [`ProxyEnvelope`]
//! describing whatever the engine answered (any status, any body shape),
//! or a [`ProxyFailure`] when no answer was obtained at all.
//!
//! `videoUrl` and `workflowStatus` are pulled out of the decoded body by a
//! fixed fallback chain: the object itself first, then the first element
//! of an array. Only non-empty strings count. Payloads outside those two
//! shapes yield `None`.

use serde::Serialize;
use serde_json::{json, Value};

use crate::transport::{RawResponse, TransportError};

/// Status reported for a call that never got an upstream reply.
pub const TRANSPORT_FAILURE_STATUS: u16 = 500;

/// Field names tried, in order, for the finished video location.
const VIDEO_URL_KEYS: [&str; 2] = ["videoUrl", "video_url"];

/// Field name for the engine's own status string.
const STATUS_KEY: &str = "status";

/// The always-structured result of one proxied call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEnvelope {
    /// Upstream status was 2xx.
    pub success: bool,
    /// Upstream HTTP status.
    #[serde(rename = "status")]
    pub http_status: u16,
    /// Decoded JSON body, or `{"message": <text>}` when it wasn't JSON.
    #[serde(rename = "data")]
    pub raw_body: Value,
    pub video_url: Option<String>,
    pub workflow_status: Option<String>,
    /// Human-readable summary; only set for resume reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProxyEnvelope {
    /// Build an envelope from an upstream reply.
    pub fn from_response(response: &RawResponse) -> Self {
        let raw_body = decode_body(&response.body);
        Self {
            success: response.is_success(),
            http_status: response.status,
            video_url: extract_video_url(&raw_body),
            workflow_status: extract_workflow_status(&raw_body),
            raw_body,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A proxied call that produced no upstream reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyFailure {
    /// Synthetic status, always [`TRANSPORT_FAILURE_STATUS`].
    #[serde(skip)]
    pub status: u16,
    /// Raw description of what went wrong.
    pub error: String,
}

impl From<TransportError> for ProxyFailure {
    fn from(err: TransportError) -> Self {
        Self {
            status: TRANSPORT_FAILURE_STATUS,
            error: err.to_string(),
        }
    }
}

/// Outcome of a proxy call. Never an `Err`: transport faults are data.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyReply {
    Envelope(ProxyEnvelope),
    Failure(ProxyFailure),
}

impl ProxyReply {
    pub fn envelope(&self) -> Option<&ProxyEnvelope> {
        match self {
            ProxyReply::Envelope(envelope) => Some(envelope),
            ProxyReply::Failure(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding and extraction
// ---------------------------------------------------------------------------

/// Strict JSON decode, falling back to `{"message": text}`.
pub fn decode_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "message": text }))
}

/// First non-empty `videoUrl`/`video_url` on the object, else on the
/// first array element.
pub fn extract_video_url(body: &Value) -> Option<String> {
    VIDEO_URL_KEYS
        .iter()
        .find_map(|key| string_field(body, key))
        .or_else(|| {
            first_element(body)
                .and_then(|first| VIDEO_URL_KEYS.iter().find_map(|key| string_field(first, key)))
        })
}

/// `status` on the object, else on the first array element.
pub fn extract_workflow_status(body: &Value) -> Option<String> {
    string_field(body, STATUS_KEY)
        .or_else(|| first_element(body).and_then(|first| string_field(first, STATUS_KEY)))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .as_object()?
        .get(key)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_element(value: &Value) -> Option<&Value> {
    value.as_array()?.first()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_body_is_wrapped() {
        let envelope = ProxyEnvelope::from_response(&RawResponse::new(200, "plain text"));
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "success": true,
                "status": 200,
                "data": { "message": "plain text" },
                "videoUrl": null,
                "workflowStatus": null,
            })
        );
    }

    #[test]
    fn array_body_extracts_from_first_element() {
        let body = r#"[{"video_url":"http://x/a.mp4","status":"done"}]"#;
        let envelope = ProxyEnvelope::from_response(&RawResponse::new(200, body));
        assert_eq!(envelope.video_url.as_deref(), Some("http://x/a.mp4"));
        assert_eq!(envelope.workflow_status.as_deref(), Some("done"));
    }

    #[test]
    fn object_camel_case_wins_over_snake_case() {
        let body = json!({ "videoUrl": "http://x/camel.mp4", "video_url": "http://x/snake.mp4" });
        assert_eq!(extract_video_url(&body).as_deref(), Some("http://x/camel.mp4"));
    }

    #[test]
    fn empty_camel_case_falls_through_to_snake_case() {
        let body = json!({ "videoUrl": "", "video_url": "http://x/snake.mp4" });
        assert_eq!(extract_video_url(&body).as_deref(), Some("http://x/snake.mp4"));
    }

    #[test]
    fn only_first_array_element_is_inspected() {
        let body = json!([{ "other": 1 }, { "videoUrl": "http://x/second.mp4" }]);
        assert_eq!(extract_video_url(&body), None);
    }

    #[test]
    fn non_string_fields_are_ignored() {
        let body = json!({ "videoUrl": 42, "status": { "nested": true } });
        assert_eq!(extract_video_url(&body), None);
        assert_eq!(extract_workflow_status(&body), None);
    }

    #[test]
    fn scalar_json_body_is_kept_as_is() {
        let envelope = ProxyEnvelope::from_response(&RawResponse::new(200, "\"queued\""));
        assert_eq!(envelope.raw_body, json!("queued"));
        assert_eq!(envelope.video_url, None);
    }

    #[test]
    fn error_status_still_builds_envelope() {
        let envelope = ProxyEnvelope::from_response(&RawResponse::new(
            404,
            r#"{"code":404,"message":"webhook not registered"}"#,
        ));
        assert!(!envelope.success);
        assert_eq!(envelope.http_status, 404);
        assert_eq!(envelope.raw_body["message"], "webhook not registered");
    }

    #[test]
    fn message_is_serialized_only_when_set() {
        let envelope =
            ProxyEnvelope::from_response(&RawResponse::new(200, "{}")).with_message("resumed");
        assert_eq!(serde_json::to_value(&envelope).unwrap()["message"], "resumed");
    }

    #[test]
    fn transport_error_becomes_failure_with_synthetic_status() {
        let failure = ProxyFailure::from(TransportError::Request("connection reset".into()));
        assert_eq!(failure.status, TRANSPORT_FAILURE_STATUS);
        assert_eq!(failure.error, "HTTP request failed: connection reset");
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            json!({ "error": "HTTP request failed: connection reset" })
        );
    }
}
