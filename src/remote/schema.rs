//! Response schemas for the inference endpoints.
//!
//! The service answers every call with a positional `data` array. Fields
//! are read at fixed indices and any deviation is a [`ShapeViolation`].

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeViolation {
    #[error("`{path}` is missing")]
    Missing { path: String },

    #[error("`{path}` is not {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
    },

    #[error("`{path}` is not valid JSON: {message}")]
    InvalidJson { path: String, message: String },

    #[error("event stream ended without a result")]
    Unterminated,
}

impl ShapeViolation {
    pub fn missing(path: impl Into<String>) -> Self {
        Self::Missing { path: path.into() }
    }
}

/// Result of one predict call: the raw positional outputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictResponse {
    pub data: Vec<Value>,
}

impl PredictResponse {
    pub fn new(data: Vec<Value>) -> Self {
        Self { data }
    }

    /// Parse a `{"data": [...]}` object.
    pub fn from_json(value: Value) -> Result<Self, ShapeViolation> {
        match value {
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(data)) => Ok(Self { data }),
                Some(_) => Err(ShapeViolation::WrongType {
                    path: "data".to_string(),
                    expected: "an array",
                }),
                None => Err(ShapeViolation::missing("data")),
            },
            _ => Err(ShapeViolation::WrongType {
                path: "$".to_string(),
                expected: "an object",
            }),
        }
    }

    /// Read the file record at `data[index]` and require its `url`.
    pub fn file_at(&self, index: usize) -> Result<RemoteFile, ShapeViolation> {
        let path = format!("data[{}]", index);
        let entry = match self.data.get(index) {
            Some(Value::Null) | None => return Err(ShapeViolation::missing(path)),
            Some(entry) => entry,
        };
        if !entry.is_object() {
            return Err(ShapeViolation::WrongType {
                path,
                expected: "a file record",
            });
        }

        let record: FileRecord =
            serde_json::from_value(entry.clone()).map_err(|e| ShapeViolation::InvalidJson {
                path: path.clone(),
                message: e.to_string(),
            })?;

        match record.url {
            Some(url) if !url.is_empty() => Ok(RemoteFile {
                url,
                orig_name: record.orig_name,
                mime_type: record.mime_type,
                size: record.size,
            }),
            _ => Err(ShapeViolation::missing(format!("{}.url", path))),
        }
    }
}

/// File record as the service serializes it. Only `url` is required.
#[derive(Debug, Clone, Deserialize)]
struct FileRecord {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    orig_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

/// A file produced by the service, addressed by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub url: String,
    pub orig_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
}

/// The service accepted the input image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgement {
    pub outputs: usize,
}

impl From<&PredictResponse> for Acknowledgement {
    fn from(response: &PredictResponse) -> Self {
        Self {
            outputs: response.data.len(),
        }
    }
}
