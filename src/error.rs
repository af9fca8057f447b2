use thiserror::Error;

use crate::remote::{RemoteError, TransportError};

/// Failure of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Reading the image failed: {0}")]
    Read(String),

    #[error("Image validation failed: {0}")]
    Validation(RemoteError),

    #[error("Preprocessing failed: {0}")]
    Processing(RemoteError),

    #[error("Downloading the processed image failed: {0}")]
    Fetch(TransportError),

    #[error("Model generation failed: {0}")]
    Generation(RemoteError),
}

impl PipelineError {
    /// Short name of the stage that failed, for status display.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Read(_) => "read",
            PipelineError::Validation(_) => "validation",
            PipelineError::Processing(_) => "preprocessing",
            PipelineError::Fetch(_) => "download",
            PipelineError::Generation(_) => "generation",
        }
    }
}

impl From<PipelineError> for String {
    fn from(err: PipelineError) -> Self {
        err.to_string()
    }
}
