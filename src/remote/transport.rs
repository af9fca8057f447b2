//! HTTP plumbing shared by the Gradio session and the pipeline's
//! intermediate download.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::media::{name_from_url, ImageBlob, FALLBACK_MIME_TYPE};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

/// Requests the Gradio session needs.
#[allow(async_fn_in_trait)]
pub trait HttpTransport: Clone {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError>;

    /// GET a body as text (used for event streams, which end when the
    /// result has been delivered).
    async fn get_text(&self, url: &str) -> Result<String, TransportError>;

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError>;

    /// Multipart upload of one file under the `files` field.
    async fn upload_file(&self, url: &str, file: &ImageBlob) -> Result<Value, TransportError>;
}

/// Downloads a URL into memory.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch_blob(&self, url: &str) -> Result<ImageBlob, TransportError>;
}

/// `reqwest`-backed transport. In the browser this goes through `fetch`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TransportError> {
        debug!("HTTP request: {}", url);
        let response = request.send().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn json_body(url: &str, response: reqwest::Response) -> Result<Value, TransportError> {
        response.json::<Value>().await.map_err(|e| TransportError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
        let response = self.send(url, self.client.get(url)).await?;
        Self::json_body(url, response).await
    }

    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        let response = self
            .send(url, self.client.get(url).header("Accept", "text/event-stream"))
            .await?;
        response.text().await.map_err(|e| TransportError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        let response = self.send(url, self.client.post(url).json(body)).await?;
        Self::json_body(url, response).await
    }

    async fn upload_file(&self, url: &str, file: &ImageBlob) -> Result<Value, TransportError> {
        let part = reqwest::multipart::Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                message: format!("invalid content type {}: {}", file.mime_type(), e),
            })?;
        let form = reqwest::multipart::Form::new().part("files", part);

        let response = self.send(url, self.client.post(url).multipart(form)).await?;
        Self::json_body(url, response).await
    }
}

impl Fetcher for ReqwestTransport {
    async fn fetch_blob(&self, url: &str) -> Result<ImageBlob, TransportError> {
        let response = self.send(url, self.client.get(url)).await?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());

        let bytes = response.bytes().await.map_err(|e| TransportError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(ImageBlob::new(name_from_url(url), mime_type, bytes.to_vec()))
    }
}
