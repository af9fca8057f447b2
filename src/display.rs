//! Display slots backed by revocable object URLs.
//!
//! Every object URL the registry creates is revoked exactly once: when its
//! slot is pointed somewhere else, when the slot is cleared, or when the
//! registry is released or dropped.

use thiserror::Error;
use tracing::{debug, warn};

use crate::media::ImageBlob;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DisplayError {
    #[error("could not create a display URL for {name}: {message}")]
    Create { name: String, message: String },
}

/// Creates and revokes object URLs.
pub trait ObjectUrlBackend {
    fn create(&mut self, blob: &ImageBlob) -> Result<String, DisplayError>;
    fn revoke(&mut self, url: &str);
}

/// Logical image panes of the pipeline widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Original,
    Processed,
}

impl Slot {
    const ALL: [Slot; 2] = [Slot::Original, Slot::Processed];

    fn index(self) -> usize {
        match self {
            Slot::Original => 0,
            Slot::Processed => 1,
        }
    }
}

/// What a slot currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySource {
    /// Object URL owned by the registry.
    Object(String),
    /// URL served by someone else; never revoked.
    Remote(String),
}

impl DisplaySource {
    pub fn url(&self) -> &str {
        match self {
            DisplaySource::Object(url) | DisplaySource::Remote(url) => url,
        }
    }
}

pub struct DisplayRegistry<B: ObjectUrlBackend> {
    backend: B,
    slots: [Option<DisplaySource>; 2],
}

impl<B: ObjectUrlBackend> DisplayRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            slots: [None, None],
        }
    }

    /// Show `blob` in `slot`. The slot's previous object URL is revoked
    /// before the new one is created.
    pub fn show_blob(&mut self, slot: Slot, blob: &ImageBlob) -> Result<&str, DisplayError> {
        self.clear(slot);
        let url = self.backend.create(blob)?;
        debug!("Created display URL {} for {:?}", url, slot);
        let source = self.slots[slot.index()].insert(DisplaySource::Object(url));
        Ok(source.url())
    }

    pub fn show_remote(&mut self, slot: Slot, url: impl Into<String>) {
        self.clear(slot);
        self.slots[slot.index()] = Some(DisplaySource::Remote(url.into()));
    }

    pub fn clear(&mut self, slot: Slot) {
        if let Some(DisplaySource::Object(url)) = self.slots[slot.index()].take() {
            debug!("Revoking display URL {} for {:?}", url, slot);
            self.backend.revoke(&url);
        }
    }

    /// Revoke everything the registry still owns.
    pub fn release_all(&mut self) {
        for slot in Slot::ALL {
            self.clear(slot);
        }
    }

    pub fn source(&self, slot: Slot) -> Option<&DisplaySource> {
        self.slots[slot.index()].as_ref()
    }

    pub fn src(&self, slot: Slot) -> Option<&str> {
        self.source(slot).map(DisplaySource::url)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: ObjectUrlBackend> Drop for DisplayRegistry<B> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Browser backend using `URL.createObjectURL` / `URL.revokeObjectURL`.
#[derive(Debug, Default)]
pub struct WebObjectUrls;

impl ObjectUrlBackend for WebObjectUrls {
    fn create(&mut self, blob: &ImageBlob) -> Result<String, DisplayError> {
        let to_error = |e: wasm_bindgen::JsValue| DisplayError::Create {
            name: blob.name().to_string(),
            message: e.as_string().unwrap_or_else(|| format!("{:?}", e)),
        };

        let bytes = js_sys::Uint8Array::from(blob.bytes());
        let parts = js_sys::Array::of1(&bytes);
        let options = web_sys::BlobPropertyBag::new();
        options.set_type(blob.mime_type());

        let web_blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(to_error)?;
        web_sys::Url::create_object_url_with_blob(&web_blob).map_err(to_error)
    }

    fn revoke(&mut self, url: &str) {
        if let Err(e) = web_sys::Url::revoke_object_url(url) {
            warn!("Failed to revoke {}: {:?}", url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        created: Vec<String>,
        revoked: Vec<String>,
    }

    #[derive(Clone, Default)]
    struct Recording(Rc<RefCell<Log>>);

    impl ObjectUrlBackend for Recording {
        fn create(&mut self, _blob: &ImageBlob) -> Result<String, DisplayError> {
            let mut log = self.0.borrow_mut();
            let url = format!("blob:test/{}", log.created.len());
            log.created.push(url.clone());
            Ok(url)
        }

        fn revoke(&mut self, url: &str) {
            self.0.borrow_mut().revoked.push(url.to_string());
        }
    }

    fn png(name: &str) -> ImageBlob {
        ImageBlob::new(name, "image/png", vec![0x89, 0x50, 0x4e, 0x47])
    }

    #[test]
    fn test_new_blob_revokes_previous_in_same_slot() {
        let backend = Recording::default();
        let mut registry = DisplayRegistry::new(backend.clone());

        registry.show_blob(Slot::Original, &png("a.png")).unwrap();
        registry.show_blob(Slot::Original, &png("b.png")).unwrap();

        let log = backend.0.borrow();
        assert_eq!(log.created, vec!["blob:test/0", "blob:test/1"]);
        assert_eq!(log.revoked, vec!["blob:test/0"]);
        assert_eq!(registry.src(Slot::Original), Some("blob:test/1"));
    }

    #[test]
    fn test_slots_are_independent() {
        let backend = Recording::default();
        let mut registry = DisplayRegistry::new(backend.clone());

        registry.show_blob(Slot::Original, &png("a.png")).unwrap();
        registry.show_blob(Slot::Processed, &png("b.png")).unwrap();

        assert!(backend.0.borrow().revoked.is_empty());
        assert_eq!(registry.src(Slot::Processed), Some("blob:test/1"));
    }

    #[test]
    fn test_remote_source_replaces_object_without_revoking_itself() {
        let backend = Recording::default();
        let mut registry = DisplayRegistry::new(backend.clone());

        registry.show_blob(Slot::Processed, &png("a.png")).unwrap();
        registry.show_remote(Slot::Processed, "https://host/x.png");
        registry.show_remote(Slot::Processed, "https://host/y.png");
        registry.release_all();

        assert_eq!(backend.0.borrow().revoked, vec!["blob:test/0"]);
        assert_eq!(registry.src(Slot::Processed), None);
    }

    #[test]
    fn test_teardown_revokes_each_url_once() {
        let backend = Recording::default();
        {
            let mut registry = DisplayRegistry::new(backend.clone());
            registry.show_blob(Slot::Original, &png("a.png")).unwrap();
            registry.show_blob(Slot::Processed, &png("b.png")).unwrap();
            registry.release_all();
            // Drop runs release_all again; nothing is left to revoke.
        }

        let mut revoked = backend.0.borrow().revoked.clone();
        revoked.sort();
        assert_eq!(revoked, vec!["blob:test/0", "blob:test/1"]);
    }

    #[test]
    fn test_drop_revokes_outstanding_urls() {
        let backend = Recording::default();
        {
            let mut registry = DisplayRegistry::new(backend.clone());
            registry.show_blob(Slot::Original, &png("a.png")).unwrap();
        }
        assert_eq!(backend.0.borrow().revoked, vec!["blob:test/0"]);
    }
}
