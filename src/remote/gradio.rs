//! Gradio session protocol.
//!
//! Connecting resolves a space id to the host serving it and reads the
//! app config for its API prefix. A prediction uploads file arguments,
//! starts the call, then reads the event stream until it completes.

use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use super::schema::{PredictResponse, ShapeViolation};
use super::transport::{HttpTransport, TransportError};
use super::{sse, Arg, Connector, RemoteError, Session};
use crate::media::ImageBlob;

#[derive(Debug, Clone)]
pub struct GradioConnector<T: HttpTransport> {
    transport: T,
    hub_url: String,
}

impl<T: HttpTransport> GradioConnector<T> {
    pub fn new(transport: T, hub_url: impl Into<String>) -> Self {
        Self {
            transport,
            hub_url: hub_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn resolve_root(&self, space: &str) -> Result<Url, RemoteError> {
        let root = if space.starts_with("http://") || space.starts_with("https://") {
            space.to_string()
        } else {
            let info_url = format!("{}/api/spaces/{}/host", self.hub_url, space);
            let info = self.transport.get_json(&info_url).await?;
            info.get("host")
                .and_then(Value::as_str)
                .ok_or_else(|| ShapeViolation::missing("host"))?
                .to_string()
        };

        parse_root(&root)
    }
}

fn parse_root(root: &str) -> Result<Url, RemoteError> {
    let normalized = format!("{}/", root.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|e| {
        TransportError::InvalidUrl {
            url: root.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

impl<T: HttpTransport> Connector for GradioConnector<T> {
    type Session = GradioSession<T>;

    async fn connect(&self, space: &str) -> Result<GradioSession<T>, RemoteError> {
        let root = self.resolve_root(space).await?;
        let config = self.transport.get_json(&format!("{}config", root)).await?;

        let api_prefix = config
            .get("api_prefix")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim_matches('/')
            .to_string();
        let version = config.get("version").and_then(Value::as_str).unwrap_or("unknown");
        info!("Connected to {} ({}), Gradio {}", space, root, version);

        Ok(GradioSession {
            transport: self.transport.clone(),
            root,
            api_prefix,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GradioSession<T: HttpTransport> {
    transport: T,
    root: Url,
    api_prefix: String,
}

impl<T: HttpTransport> GradioSession<T> {
    /// Base for API routes: the root plus the optional prefix, no trailing slash.
    pub fn api_base(&self) -> String {
        let root = self.root.as_str().trim_end_matches('/');
        if self.api_prefix.is_empty() {
            root.to_string()
        } else {
            format!("{}/{}", root, self.api_prefix)
        }
    }

    async fn upload(&self, file: &ImageBlob) -> Result<Value, RemoteError> {
        let response = self
            .transport
            .upload_file(&format!("{}/upload", self.api_base()), file)
            .await?;

        let path = response
            .get(0)
            .and_then(Value::as_str)
            .ok_or_else(|| ShapeViolation::missing("upload[0]"))?;
        debug!("Uploaded {} ({} bytes) as {}", file.name(), file.len(), path);

        Ok(json!({
            "path": path,
            "orig_name": file.name(),
            "mime_type": file.mime_type(),
            "size": file.len(),
            "meta": { "_type": "gradio.FileData" },
        }))
    }

    /// Rewrite root-relative `url` fields of file records into absolute URLs.
    fn absolutize(&self, data: &mut [Value]) {
        for entry in data.iter_mut() {
            let Some(url) = entry.get_mut("url") else {
                continue;
            };
            let absolute = url
                .as_str()
                .filter(|u| u.starts_with('/'))
                .and_then(|u| self.root.join(u.trim_start_matches('/')).ok());
            if let Some(absolute) = absolute {
                *url = Value::String(absolute.to_string());
            }
        }
    }
}

impl<T: HttpTransport> Session for GradioSession<T> {
    async fn predict(&self, endpoint: &str, args: &[Arg<'_>]) -> Result<PredictResponse, RemoteError> {
        let mut data = Vec::with_capacity(args.len());
        for arg in args {
            data.push(match arg {
                Arg::File(file) => self.upload(file).await?,
                Arg::Value(value) => (*value).clone(),
            });
        }

        let call_url = format!("{}/call/{}", self.api_base(), endpoint.trim_start_matches('/'));
        let started = self
            .transport
            .post_json(&call_url, &json!({ "data": data }))
            .await?;
        let event_id = started
            .get("event_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ShapeViolation::missing("event_id"))?;
        debug!("Started {} as event {}", endpoint, event_id);

        let stream = self
            .transport
            .get_text(&format!("{}/{}", call_url, event_id))
            .await?;
        let mut outputs = sse::final_outputs(&stream)?;
        self.absolutize(&mut outputs);

        Ok(PredictResponse::new(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct Exchange {
        gets: HashMap<String, Value>,
        streams: HashMap<String, String>,
        posts: HashMap<String, Value>,
        uploads: HashMap<String, Value>,
        posted: Vec<(String, Value)>,
        uploaded: Vec<(String, String)>,
    }

    #[derive(Debug, Clone, Default)]
    struct MockTransport(Rc<RefCell<Exchange>>);

    impl MockTransport {
        fn not_found(url: &str) -> TransportError {
            TransportError::Status {
                url: url.to_string(),
                status: 404,
            }
        }
    }

    impl HttpTransport for MockTransport {
        async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
            self.0.borrow().gets.get(url).cloned().ok_or_else(|| Self::not_found(url))
        }

        async fn get_text(&self, url: &str) -> Result<String, TransportError> {
            self.0.borrow().streams.get(url).cloned().ok_or_else(|| Self::not_found(url))
        }

        async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
            let mut exchange = self.0.borrow_mut();
            exchange.posted.push((url.to_string(), body.clone()));
            exchange.posts.get(url).cloned().ok_or_else(|| Self::not_found(url))
        }

        async fn upload_file(&self, url: &str, file: &ImageBlob) -> Result<Value, TransportError> {
            let mut exchange = self.0.borrow_mut();
            exchange.uploaded.push((url.to_string(), file.name().to_string()));
            exchange.uploads.get(url).cloned().ok_or_else(|| Self::not_found(url))
        }
    }

    const HOST: &str = "https://owner-space.hf.space";

    fn transport_for_space(api_prefix: Option<&str>) -> MockTransport {
        let transport = MockTransport::default();
        {
            let mut exchange = transport.0.borrow_mut();
            exchange.gets.insert(
                "https://hub.example/api/spaces/owner/space/host".to_string(),
                json!({"subdomain": "owner-space", "host": HOST}),
            );
            let config = match api_prefix {
                Some(prefix) => json!({"version": "5.0.0", "api_prefix": prefix}),
                None => json!({"version": "4.36.0"}),
            };
            exchange.gets.insert(format!("{}/config", HOST), config);
        }
        transport
    }

    #[tokio::test]
    async fn test_connect_resolves_space_host() {
        let connector = GradioConnector::new(transport_for_space(None), "https://hub.example/");
        let session = connector.connect("owner/space").await.unwrap();
        assert_eq!(session.api_base(), HOST);
    }

    #[tokio::test]
    async fn test_connect_uses_api_prefix() {
        let connector = GradioConnector::new(transport_for_space(Some("/gradio_api")), "https://hub.example");
        let session = connector.connect("owner/space").await.unwrap();
        assert_eq!(session.api_base(), format!("{}/gradio_api", HOST));
    }

    #[tokio::test]
    async fn test_connect_accepts_direct_root() {
        let transport = MockTransport::default();
        transport
            .0
            .borrow_mut()
            .gets
            .insert("http://localhost:7860/config".to_string(), json!({}));
        let connector = GradioConnector::new(transport, "https://hub.example");

        let session = connector.connect("http://localhost:7860/").await.unwrap();
        assert_eq!(session.api_base(), "http://localhost:7860");
    }

    #[tokio::test]
    async fn test_connect_fails_when_space_unknown() {
        let connector = GradioConnector::new(MockTransport::default(), "https://hub.example");
        let err = connector.connect("owner/missing").await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Transport(TransportError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_predict_uploads_files_and_reads_stream() {
        let transport = transport_for_space(None);
        {
            let mut exchange = transport.0.borrow_mut();
            exchange.uploads.insert(
                format!("{}/upload", HOST),
                json!(["/tmp/gradio/abc/cat.png"]),
            );
            exchange.posts.insert(
                format!("{}/call/preprocess", HOST),
                json!({"event_id": "ev1"}),
            );
            exchange.streams.insert(
                format!("{}/call/preprocess/ev1", HOST),
                "event: heartbeat\ndata: null\n\nevent: complete\ndata: [{\"path\": \"/tmp/out.png\", \"url\": \"/file=/tmp/out.png\"}]\n\n".to_string(),
            );
        }

        let connector = GradioConnector::new(transport.clone(), "https://hub.example");
        let session = connector.connect("owner/space").await.unwrap();

        let image = ImageBlob::new("cat.png", "image/png", vec![1, 2, 3]);
        let flag = Value::Bool(true);
        let ratio = json!(0.5);
        let response = session
            .predict(
                "/preprocess",
                &[Arg::File(&image), Arg::Value(&flag), Arg::Value(&ratio)],
            )
            .await
            .unwrap();

        let file = response.file_at(0).unwrap();
        assert_eq!(file.url, format!("{}/file=/tmp/out.png", HOST));

        let exchange = transport.0.borrow();
        assert_eq!(exchange.uploaded, vec![(format!("{}/upload", HOST), "cat.png".to_string())]);
        let (url, body) = &exchange.posted[0];
        assert_eq!(url, &format!("{}/call/preprocess", HOST));
        assert_eq!(body["data"][0]["path"], "/tmp/gradio/abc/cat.png");
        assert_eq!(body["data"][0]["meta"]["_type"], "gradio.FileData");
        assert_eq!(body["data"][1], true);
        assert_eq!(body["data"][2], 0.5);
    }

    #[tokio::test]
    async fn test_predict_surfaces_service_error() {
        let transport = transport_for_space(None);
        {
            let mut exchange = transport.0.borrow_mut();
            exchange.posts.insert(
                format!("{}/call/check_input_image", HOST),
                json!({"event_id": "ev2"}),
            );
            exchange.streams.insert(
                format!("{}/call/check_input_image/ev2", HOST),
                "event: error\ndata: \"No image uploaded!\"\n\n".to_string(),
            );
        }

        let connector = GradioConnector::new(transport, "https://hub.example");
        let session = connector.connect("owner/space").await.unwrap();
        let err = session.predict("/check_input_image", &[]).await.unwrap_err();
        assert_eq!(err, RemoteError::Service("No image uploaded!".to_string()));
    }

    #[tokio::test]
    async fn test_predict_requires_event_id() {
        let transport = transport_for_space(None);
        transport
            .0
            .borrow_mut()
            .posts
            .insert(format!("{}/call/generate", HOST), json!({}));

        let connector = GradioConnector::new(transport, "https://hub.example");
        let session = connector.connect("owner/space").await.unwrap();
        let err = session.predict("/generate", &[]).await.unwrap_err();
        assert_eq!(err, RemoteError::Shape(ShapeViolation::missing("event_id")));
    }
}
