use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{GatewayResponse, MailParser, ObjectStore, PutObject};
use crate::error::Error;

/// Tag set applied to every extracted attachment.
const ATTACHMENT_TAGGING: &str = "public=yes";

/// Where extracted attachments are written.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct AttachmentsConfig {
    pub bucket: String,
    /// Key prefix, without a trailing `/`.
    pub key_prefix: String,
}

impl AttachmentsConfig {
    #[must_use]
    pub fn new(bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key_prefix: key_prefix.into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `BUCKET_NAME`: bucket attachments are written to
    /// - `ATTACHMENTS_KEY_PREFIX`: key prefix for attachments
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either variable is missing.
    pub fn from_env() -> Result<Self, Error> {
        let bucket = std::env::var("BUCKET_NAME")
            .map_err(|_| Error::Config("BUCKET_NAME is required".into()))?;
        let key_prefix = std::env::var("ATTACHMENTS_KEY_PREFIX")
            .map_err(|_| Error::Config("ATTACHMENTS_KEY_PREFIX is required".into()))?;
        Ok(Self::new(bucket, key_prefix))
    }

    /// Key an attachment of the email stored at `email_key` is written to.
    ///
    /// Every attachment of one email maps to the same key.
    #[must_use]
    pub fn attachment_key(&self, email_key: &str) -> String {
        format!("{}/{email_key}", self.key_prefix)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

/// Notification that a raw email was stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEmailEvent {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

/// Handler result: the triggering event on success, the generic failure otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExtractOutcome {
    Event(JsonValue),
    Failure(GatewayResponse),
}

/// Handler: writes every attachment of the stored email referenced by `event`.
///
/// Attachments are written concurrently.
pub async fn extract_attachments<O, M>(
    config: &AttachmentsConfig,
    objects: &O,
    parser: &M,
    event: JsonValue,
) -> ExtractOutcome
where
    O: ObjectStore,
    M: MailParser,
{
    match extract(config, objects, parser, &event).await {
        Ok(etags) => {
            tracing::info!(count = etags.len(), etags = ?etags, "Stored email attachments");
            ExtractOutcome::Event(event)
        }
        Err(e) => {
            tracing::error!(error = %e, "Attachment extraction failed");
            ExtractOutcome::Failure(GatewayResponse::failure())
        }
    }
}

async fn extract<O: ObjectStore, M: MailParser>(
    config: &AttachmentsConfig,
    objects: &O,
    parser: &M,
    event: &JsonValue,
) -> Result<Vec<String>, Error> {
    let stored = StoredEmailEvent::deserialize(event)?;
    let raw = objects
        .get_object(&stored.bucket.name, &stored.object.key)
        .await?;
    let raw = String::from_utf8_lossy(&raw);
    let attachments = parser.attachments(&raw)?;

    let key = config.attachment_key(&stored.object.key);
    let writes = attachments.into_iter().map(|attachment| {
        tracing::debug!(filename = ?attachment.filename, key = %key, "Writing attachment");
        objects.put_object(PutObject {
            bucket: config.bucket.clone(),
            key: key.clone(),
            body: attachment.content,
            content_type: attachment.content_type,
            tagging: ATTACHMENT_TAGGING.to_owned(),
        })
    });
    try_join_all(writes).await
}
