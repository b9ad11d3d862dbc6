use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value as JsonValue;

use super::render::ItemRegistry;
use crate::error::Error;

/// A file picked in an upload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Where the save hook sends a document.
pub trait DocumentSink {
    /// Writes the authoritative local copy.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the local store rejects the write.
    fn save_local(&self, document: &JsonValue) -> Result<(), Error>;

    /// Starts mirroring `document` remotely without waiting for the outcome.
    fn save_remote(&self, document: JsonValue);
}

/// Editor extension points: saving, adding list items, and uploads.
///
/// [`DemoHooks`] keeps everything client-side. Substitute another
/// implementation to change the behavior.
pub trait EditorHooks: Send + Sync + 'static {
    /// Persists the edited document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document could not be saved locally.
    fn save(&self, document: &JsonValue, sink: &dyn DocumentSink) -> Result<(), Error>;

    /// HTML of a new, empty item of `template_name`, or `None` if no such item exists.
    fn add_item(&self, template_name: &str, registry: &ItemRegistry) -> Option<String>;

    /// Value to store for an uploaded file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be stored.
    fn upload(&self, file: &UploadedFile) -> Result<String, Error>;
}

/// Saves locally then remotely, renders new items from the registry, and
/// inlines uploads as `data:` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoHooks;

impl EditorHooks for DemoHooks {
    fn save(&self, document: &JsonValue, sink: &dyn DocumentSink) -> Result<(), Error> {
        sink.save_local(document)?;
        sink.save_remote(document.clone());
        Ok(())
    }

    fn add_item(&self, template_name: &str, registry: &ItemRegistry) -> Option<String> {
        registry.render(template_name, &JsonValue::Object(serde_json::Map::new()))
    }

    fn upload(&self, file: &UploadedFile) -> Result<String, Error> {
        Ok(data_url(&file.mime_type, &file.bytes))
    }
}

/// `data:{mime};base64,{bytes}`, as a browser `FileReader` produces.
#[must_use]
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    };
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<String>>,
        fail_local: bool,
    }

    impl DocumentSink for Recorder {
        fn save_local(&self, document: &JsonValue) -> Result<(), Error> {
            if self.fail_local {
                return Err(Error::Storage("quota exceeded".into()));
            }
            self.events.borrow_mut().push(format!("local {document}"));
            Ok(())
        }

        fn save_remote(&self, document: JsonValue) {
            self.events.borrow_mut().push(format!("remote {document}"));
        }
    }

    #[test]
    fn save_goes_local_then_remote() {
        let sink = Recorder::default();
        DemoHooks.save(&json!({"a": 1}), &sink).unwrap();
        assert_eq!(
            *sink.events.borrow(),
            vec![r#"local {"a":1}"#.to_owned(), r#"remote {"a":1}"#.to_owned()]
        );
    }

    #[test]
    fn failed_local_save_skips_remote() {
        let sink = Recorder {
            fail_local: true,
            ..Recorder::default()
        };
        assert!(DemoHooks.save(&json!({}), &sink).is_err());
        assert!(sink.events.borrow().is_empty());
    }

    #[test]
    fn add_item_renders_with_empty_data() {
        let mut registry = ItemRegistry::new();
        registry.register("todo", Arc::new(|data: &JsonValue| format!("<li>{data}</li>")));
        assert_eq!(DemoHooks.add_item("todo", &registry).as_deref(), Some("<li>{}</li>"));
        assert!(DemoHooks.add_item("note", &registry).is_none());
    }

    #[test]
    fn upload_becomes_data_url() {
        let file = UploadedFile {
            name: "dot.png".into(),
            mime_type: "image/png".into(),
            bytes: b"hi".to_vec(),
        };
        assert_eq!(DemoHooks.upload(&file).unwrap(), "data:image/png;base64,aGk=");
        assert_eq!(data_url("", b""), "data:application/octet-stream;base64,");
    }
}
