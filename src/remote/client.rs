use serde_json::Value;
use tracing::{error, info};

use super::schema::{Acknowledgement, PredictResponse, RemoteFile};
use super::{Arg, Connector, RemoteError, Session};
use crate::config::{MarchingCubesResolution, PreprocessOptions};
use crate::error::PipelineError;
use crate::media::ImageBlob;

/// Output index of the processed image in the preprocess result.
const PREPROCESSED_IMAGE_INDEX: usize = 0;

/// Output index of the GLB model in the generate result (index 0 is the OBJ).
const GENERATED_ASSET_INDEX: usize = 1;

/// Endpoints of the image-to-3D space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    CheckInputImage,
    Preprocess,
    Generate,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::CheckInputImage => "/check_input_image",
            Endpoint::Preprocess => "/preprocess",
            Endpoint::Generate => "/generate",
        }
    }
}

/// The three operations of the inference service. Every call opens its own
/// session against `space`.
pub struct InferenceClient<C: Connector> {
    connector: C,
    space: String,
}

impl<C: Connector> InferenceClient<C> {
    pub fn new(connector: C, space: impl Into<String>) -> Self {
        Self {
            connector,
            space: space.into(),
        }
    }

    pub fn space(&self) -> &str {
        &self.space
    }

    async fn call(&self, endpoint: Endpoint, args: &[Arg<'_>]) -> Result<PredictResponse, RemoteError> {
        let session = self.connector.connect(&self.space).await?;
        session.predict(endpoint.path(), args).await
    }

    /// Ask the service whether `image` is usable.
    pub async fn check_input_image(&self, image: &ImageBlob) -> Result<Acknowledgement, PipelineError> {
        match self.call(Endpoint::CheckInputImage, &[Arg::File(image)]).await {
            Ok(response) => Ok(Acknowledgement::from(&response)),
            Err(e) => {
                error!("Error checking image {}: {}", image.name(), e);
                Err(PipelineError::Validation(e))
            }
        }
    }

    pub async fn preprocess(
        &self,
        image: &ImageBlob,
        options: &PreprocessOptions,
    ) -> Result<RemoteFile, PipelineError> {
        let remove_background = Value::Bool(options.remove_background);
        let foreground_ratio = Value::from(options.foreground_ratio.get());
        let args = [
            Arg::File(image),
            Arg::Value(&remove_background),
            Arg::Value(&foreground_ratio),
        ];

        let result = self
            .call(Endpoint::Preprocess, &args)
            .await
            .and_then(|response| response.file_at(PREPROCESSED_IMAGE_INDEX).map_err(RemoteError::from));
        match result {
            Ok(file) => {
                info!("Preprocessed image available at {}", file.url);
                Ok(file)
            }
            Err(e) => {
                error!("Error preprocessing image {}: {}", image.name(), e);
                Err(PipelineError::Processing(e))
            }
        }
    }

    pub async fn generate(
        &self,
        image: &ImageBlob,
        resolution: MarchingCubesResolution,
    ) -> Result<RemoteFile, PipelineError> {
        let resolution = Value::from(resolution.get());
        let args = [Arg::File(image), Arg::Value(&resolution)];

        let result = self
            .call(Endpoint::Generate, &args)
            .await
            .and_then(|response| response.file_at(GENERATED_ASSET_INDEX).map_err(RemoteError::from));
        match result {
            Ok(file) => {
                info!("Generated model available at {}", file.url);
                Ok(file)
            }
            Err(e) => {
                error!("Error generating model from {}: {}", image.name(), e);
                Err(PipelineError::Generation(e))
            }
        }
    }
}
