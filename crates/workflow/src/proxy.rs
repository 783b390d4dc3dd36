//! Start/resume proxy in front of the workflow engine.
//!
//! A call without a resume pointer goes to the configured start endpoint;
//! with one, it goes to the pointer instead. Reads are plain `GET`s.
//! Submits are `POST`s whose body is forwarded byte-for-byte:
//!
//! - multipart bodies keep the inbound `Content-Type` untouched, since its
//!   boundary parameter is the only one that matches the bytes;
//! - anything else is a raw buffer whose `Content-Type` (if any) is copied
//!   through.
//!
//! A resume submit answered with `405 Method Not Allowed` is retried once
//! as a `GET` against the same pointer. There is no other retry.

use std::convert::Infallible;
use std::sync::Arc;

use futures::stream;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};

use crate::envelope::{ProxyEnvelope, ProxyFailure, ProxyReply};
use crate::transport::{RawResponse, TransportError, WorkflowTransport};

/// Message attached to a successful resume read.
pub const RESUME_OK_MESSAGE: &str = "Workflow resumed successfully";
/// Message attached to an unsuccessful resume read.
pub const RESUME_FAILED_MESSAGE: &str = "Workflow resume failed";

const MULTIPART_FORM_DATA: &[u8] = b"multipart/form-data";

// ---------------------------------------------------------------------------
// SubmitBody
// ---------------------------------------------------------------------------

/// An inbound submit payload, classified by content type.
///
/// The `Content-Type` is kept as the inbound [`HeaderValue`] so that it is
/// forwarded byte-for-byte, including values that are not visible ASCII.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitBody {
    /// `multipart/form-data`, forwarded as the exact inbound bytes.
    Multipart {
        content_type: HeaderValue,
        bytes: Vec<u8>,
    },
    /// Any other payload, forwarded as an opaque buffer.
    Raw {
        content_type: Option<HeaderValue>,
        bytes: Vec<u8>,
    },
}

impl SubmitBody {
    /// Classify an inbound body by its `Content-Type` header value.
    pub fn from_inbound(content_type: Option<HeaderValue>, bytes: Vec<u8>) -> Self {
        match content_type {
            Some(content_type) if is_multipart(&content_type) => SubmitBody::Multipart {
                content_type,
                bytes,
            },
            content_type => SubmitBody::Raw {
                content_type,
                bytes,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, SubmitBody::Multipart { .. })
    }

    fn bytes(&self) -> &[u8] {
        match self {
            SubmitBody::Multipart { bytes, .. } | SubmitBody::Raw { bytes, .. } => bytes,
        }
    }

    /// Split into the outbound headers and body bytes.
    fn into_parts(self) -> (HeaderMap, Vec<u8>) {
        let (content_type, bytes) = match self {
            SubmitBody::Multipart {
                content_type,
                bytes,
            } => (Some(content_type), bytes),
            SubmitBody::Raw {
                content_type,
                bytes,
            } => (content_type, bytes),
        };
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, content_type);
        }
        (headers, bytes)
    }
}

/// True when the media type is `multipart/form-data`, in any letter case.
pub fn is_multipart(content_type: &HeaderValue) -> bool {
    content_type
        .as_bytes()
        .trim_ascii_start()
        .get(..MULTIPART_FORM_DATA.len())
        .is_some_and(|essence| essence.eq_ignore_ascii_case(MULTIPART_FORM_DATA))
}

/// Field names of a multipart body, in order.
///
/// Parses with `multer`; unnamed parts are skipped. Used for logging only,
/// the forwarded bytes never depend on it.
pub async fn multipart_field_names(
    content_type: &str,
    bytes: &[u8],
) -> Result<Vec<String>, multer::Error> {
    let boundary = multer::parse_boundary(content_type)?;
    let chunk = bytes.to_vec();
    let body = stream::once(async move { Ok::<_, Infallible>(chunk) });
    let mut multipart = multer::Multipart::new(body, boundary);

    let mut names = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if let Some(name) = field.name() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

async fn log_multipart_fields(content_type: &HeaderValue, bytes: &[u8]) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    let Ok(content_type) = content_type.to_str() else {
        return;
    };
    match multipart_field_names(content_type, bytes).await {
        Ok(fields) => tracing::debug!(?fields, "Forwarding multipart fields"),
        Err(e) => tracing::debug!(error = %e, "Multipart body did not parse, forwarding as-is"),
    }
}

// ---------------------------------------------------------------------------
// WorkflowProxy
// ---------------------------------------------------------------------------

/// Stateless translator between inbound job calls and the engine.
pub struct WorkflowProxy {
    transport: Arc<dyn WorkflowTransport>,
    start_url: String,
}

impl WorkflowProxy {
    /// `start_url` is the fixed endpoint used when no resume pointer is
    /// given.
    pub fn new(transport: Arc<dyn WorkflowTransport>, start_url: impl Into<String>) -> Self {
        Self {
            transport,
            start_url: start_url.into(),
        }
    }

    /// Read-style call: `GET` the start endpoint or the resume pointer.
    pub async fn read(&self, resume: Option<&str>) -> ProxyReply {
        let target = self.target(resume);
        match resume {
            Some(_) => tracing::info!(target, "Resuming workflow via pointer"),
            None => tracing::info!(target, "Reading workflow start endpoint"),
        }

        let response = match self.get(target).await {
            Ok(response) => response,
            Err(e) => return failure(target, e),
        };

        let envelope = ProxyEnvelope::from_response(&response);
        let envelope = match resume {
            Some(_) if envelope.success => envelope.with_message(RESUME_OK_MESSAGE),
            Some(_) => envelope.with_message(RESUME_FAILED_MESSAGE),
            None => envelope,
        };
        ProxyReply::Envelope(envelope)
    }

    /// Submit-style call: `POST` the payload, with the 405 fallback for
    /// resume pointers.
    pub async fn submit(&self, resume: Option<&str>, body: SubmitBody) -> ProxyReply {
        let target = self.target(resume);
        tracing::info!(
            target,
            resuming = resume.is_some(),
            multipart = body.is_multipart(),
            size = body.len(),
            "Proxying workflow submit",
        );
        if let SubmitBody::Multipart {
            content_type,
            bytes,
        } = &body
        {
            log_multipart_fields(content_type, bytes).await;
        }

        let (headers, bytes) = body.into_parts();

        let mut response = match self
            .transport
            .call(target, Method::POST, Some(bytes), headers)
            .await
        {
            Ok(response) => response,
            Err(e) => return failure(target, e),
        };
        log_response(target, &response);

        if response.status == StatusCode::METHOD_NOT_ALLOWED.as_u16() && resume.is_some() {
            tracing::info!(target, "Method not allowed on resume pointer, retrying with GET");
            response = match self.get(target).await {
                Ok(response) => response,
                Err(e) => return failure(target, e),
            };
        }

        ProxyReply::Envelope(ProxyEnvelope::from_response(&response))
    }

    fn target<'a>(&'a self, resume: Option<&'a str>) -> &'a str {
        resume.unwrap_or(&self.start_url)
    }

    async fn get(&self, target: &str) -> Result<RawResponse, TransportError> {
        let response = self
            .transport
            .call(target, Method::GET, None, HeaderMap::new())
            .await?;
        log_response(target, &response);
        Ok(response)
    }
}

fn log_response(target: &str, response: &RawResponse) {
    tracing::debug!(
        target,
        status = response.status,
        body = %response.body,
        "Workflow engine responded",
    );
}

fn failure(target: &str, err: TransportError) -> ProxyReply {
    tracing::error!(target, error = %err, "Workflow call failed");
    ProxyReply::Failure(ProxyFailure::from(err))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
