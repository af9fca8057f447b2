//! Client for the hosted image-to-3D inference service.
//!
//! # Architecture
//!
//! - **Connector / Session**: one session per call against a named space
//! - **Gradio**: the production session speaks Gradio's upload + call +
//!   event-stream protocol over an [`HttpTransport`]
//! - **Schema**: positional outputs are parsed at the boundary into typed
//!   results or a [`ShapeViolation`]
//! - **InferenceClient**: the three operations the pipeline sequences

pub mod client;
pub mod gradio;
pub mod schema;
pub mod sse;
pub mod transport;

use serde_json::Value;
use thiserror::Error;

use crate::media::ImageBlob;

pub use client::{Endpoint, InferenceClient};
pub use gradio::{GradioConnector, GradioSession};
pub use schema::{Acknowledgement, PredictResponse, RemoteFile, ShapeViolation};
pub use transport::{Fetcher, HttpTransport, ReqwestTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed response: {0}")]
    Shape(#[from] ShapeViolation),

    #[error("service error: {0}")]
    Service(String),
}

/// Positional argument of a predict call.
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    /// Uploaded before the call and passed by reference.
    File(&'a ImageBlob),
    Value(&'a Value),
}

/// Opens sessions against a named space.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Session: Session;

    async fn connect(&self, space: &str) -> Result<Self::Session, RemoteError>;
}

/// An established connection able to run predictions.
#[allow(async_fn_in_trait)]
pub trait Session {
    async fn predict(&self, endpoint: &str, args: &[Arg<'_>]) -> Result<PredictResponse, RemoteError>;
}
