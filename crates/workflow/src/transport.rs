//! Outbound HTTP seam to the workflow engine.
//!
//! [`WorkflowTransport`] is the only place an upstream call happens, so
//! tests substitute a scripted fake. [`ReqwestTransport`] is the
//! production implementation; its client timeout is the only bound on an
//! outbound call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};

/// Status and body text of an upstream reply, whatever its status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to obtain any upstream reply at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The target is not an absolute http(s) URL.
    #[error("Invalid target URL '{0}'")]
    InvalidTarget(String),

    /// The transport's own timeout elapsed.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// DNS, connect, reset, TLS, or body read failure.
    #[error("HTTP request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Issue one HTTP call against the workflow engine.
#[async_trait]
pub trait WorkflowTransport: Send + Sync {
    async fn call(
        &self,
        target: &str,
        method: Method,
        body: Option<Vec<u8>>,
        headers: HeaderMap,
    ) -> Result<RawResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// ReqwestTransport
// ---------------------------------------------------------------------------

/// Default timeout for a single upstream call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// [`WorkflowTransport`] backed by a pooled [`reqwest::Client`].
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport whose calls are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl WorkflowTransport for ReqwestTransport {
    async fn call(
        &self,
        target: &str,
        method: Method,
        body: Option<Vec<u8>>,
        headers: HeaderMap,
    ) -> Result<RawResponse, TransportError> {
        let url = parse_target(target)?;

        let mut request = self.client.request(method, url).headers(headers);
        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

/// Accept only absolute http(s) URLs.
pub fn parse_target(target: &str) -> Result<Url, TransportError> {
    let url = Url::parse(target).map_err(|_| TransportError::InvalidTarget(target.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(TransportError::InvalidTarget(target.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn new_does_not_panic() {
        let _transport = ReqwestTransport::new(Duration::from_secs(5));
    }

    #[test]
    fn success_is_2xx_only() {
        assert!(RawResponse::new(200, "").is_success());
        assert!(RawResponse::new(204, "").is_success());
        assert!(!RawResponse::new(302, "").is_success());
        assert!(!RawResponse::new(405, "").is_success());
    }

    #[test]
    fn parse_target_rejects_relative_and_non_http() {
        assert_matches!(parse_target("/webhook/abc"), Err(TransportError::InvalidTarget(_)));
        assert_matches!(parse_target("ftp://host/x"), Err(TransportError::InvalidTarget(_)));
        assert!(parse_target("https://engine.example.com/webhook-waiting/1").is_ok());
    }

    #[tokio::test]
    async fn invalid_target_fails_without_network() {
        let transport = ReqwestTransport::default();
        let result = transport
            .call("not a url", Method::GET, None, HeaderMap::new())
            .await;
        assert_matches!(result, Err(TransportError::InvalidTarget(t)) if t == "not a url");
    }

    #[test]
    fn transport_error_display() {
        let err = TransportError::Timeout("operation timed out".into());
        assert_eq!(err.to_string(), "Request timed out: operation timed out");
    }
}
