//! Client side of the external workflow engine.
//!
//! The engine is a black box reachable over HTTP. This crate provides:
//!
//! - [`transport`]: the injected [`WorkflowTransport`] seam and its
//!   reqwest implementation.
//! - [`envelope`]: the normalized [`ProxyEnvelope`] built from any
//!   upstream reply, plus best-effort field extraction.
//! - [`proxy`]: [`WorkflowProxy`], which turns start/resume requests into
//!   exactly one upstream call (plus the single 405 fallback).

pub mod envelope;
pub mod proxy;
pub mod transport;

pub use envelope::{ProxyEnvelope, ProxyFailure, ProxyReply};
pub use proxy::{SubmitBody, WorkflowProxy};
pub use transport::{RawResponse, ReqwestTransport, TransportError, WorkflowTransport};
