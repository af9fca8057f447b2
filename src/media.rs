//! Binary image payloads moved between the picker, the display slots and
//! the remote service.

use std::fmt;

use thiserror::Error;
use wasm_bindgen::JsCast;

/// Content type used when a file or response does not declare one.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Value for the picker's `accept` attribute.
pub const IMAGE_ACCEPT: &str = "image/*";

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {name}: {message}")]
    Read { name: String, message: String },
}

/// Bytes plus the metadata needed to display or upload them.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl ImageBlob {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime_type = mime_type.into();
        Self {
            name: name.into(),
            mime_type: if mime_type.is_empty() {
                FALLBACK_MIME_TYPE.to_string()
            } else {
                mime_type
            },
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// File name for content downloaded from `url`: the last path segment.
pub fn name_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_else(|| "download".to_string())
}

/// Read a picked `File` into memory.
pub async fn read_file(file: &web_sys::File) -> Result<ImageBlob, ReadError> {
    use js_sys::{ArrayBuffer, Uint8Array};
    use wasm_bindgen_futures::JsFuture;

    let name = file.name();
    let array_buffer: ArrayBuffer = JsFuture::from(file.array_buffer())
        .await
        .map_err(|e| ReadError::Read {
            name: name.clone(),
            message: format!("{:?}", e),
        })?
        .dyn_into()
        .map_err(|_| ReadError::Read {
            name: name.clone(),
            message: "result is not an ArrayBuffer".to_string(),
        })?;

    let bytes = Uint8Array::new(&array_buffer).to_vec();
    Ok(ImageBlob::new(name, file.type_(), bytes))
}
