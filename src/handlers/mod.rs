//! Cloud-function handlers backing the demo.
//!
//! - [`presign`]: issues presigned upload URLs to logged-in callers, scoped
//!   to a per-user prefix derived from the caller's identity token.
//! - [`attachments`]: splits a stored raw email into one object per attachment.
//!
//! Object storage and mail parsing are collaborators supplied by the host
//! through [`UploadPresigner`], [`ObjectStore`] and [`MailParser`].

pub mod attachments;
pub mod presign;
#[cfg(feature = "axum")]
pub mod routes;

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

pub use attachments::{AttachmentsConfig, StoredEmailEvent, extract_attachments};
pub use presign::{PresignConfig, presign_upload, upload_key};

/// Issues time-limited upload URLs for single objects.
pub trait UploadPresigner: Send + Sync + 'static {
    /// Presigns a `PUT` of `key` into `bucket`.
    fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> impl Future<Output = Result<Url, Error>> + Send;
}

/// An object to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    /// URL-encoded tag set, e.g. `public=yes`.
    pub tagging: String,
}

/// Object storage reads and writes.
pub trait ObjectStore: Send + Sync + 'static {
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl Future<Output = Result<Vec<u8>, Error>> + Send;

    /// Writes `object`, returning the stored object's ETag.
    fn put_object(&self, object: PutObject) -> impl Future<Output = Result<String, Error>> + Send;
}

/// One attachment of a parsed email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: Option<String>,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Parses raw RFC 822 messages.
pub trait MailParser: Send + Sync + 'static {
    /// Extracts the attachments of `raw`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be parsed.
    fn attachments(&self, raw: &str) -> Result<Vec<Attachment>, Error>;
}

/// Proxy-integration request as delivered by the API gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query_string_parameters: HashMap<String, String>,
}

impl GatewayRequest {
    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_string_parameters.get(name).map(String::as_str)
    }
}

/// Proxy-integration response. `body` holds serialized JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, serde_json::Value>,
    pub body: String,
}

impl GatewayResponse {
    /// `200` with `body` serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if `body` cannot be serialized.
    pub fn ok<T: Serialize>(body: &T) -> Result<Self, Error> {
        Ok(Self {
            status_code: 200,
            headers: HashMap::new(),
            body: serde_json::to_string(body)?,
        })
    }

    /// The generic failure response shared by every handler.
    #[must_use]
    pub fn failure() -> Self {
        Self {
            status_code: 400,
            headers: HashMap::from([
                ("Access-Control-Allow-Origin".to_owned(), serde_json::Value::from("*")),
                ("Access-Control-Allow-Credentials".to_owned(), serde_json::Value::from(true)),
            ]),
            body: serde_json::json!({"msg": "no data"}).to_string(),
        }
    }
}
