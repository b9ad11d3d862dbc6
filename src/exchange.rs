use std::future::Future;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use url::Url;

use crate::config::ScratchpadConfig;
use crate::error::Error;
use crate::naming;
use crate::session::{AddressBar, SessionGuard, SessionState};
use crate::store::KeyValueStore;
use crate::token::Claims;

/// Content type announced when requesting an upload URL for a document.
pub const DOCUMENT_CONTENT_TYPE: &str = "application/json";

/// Body returned by the presigned-upload-URL endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrlResponse {
    pub psu: String,
}

/// Network operations the remote exchange depends on.
///
/// [`HttpTransport`](crate::http::HttpTransport) is the reqwest-backed
/// implementation.
pub trait DocumentTransport: Send + Sync + 'static {
    /// Unauthenticated `GET` of a JSON document.
    fn fetch_document(&self, url: Url) -> impl Future<Output = Result<JsonValue, Error>> + Send;

    /// `GET` of a presigned upload URL, with `id_token` in the `Authorization` header.
    fn request_upload_url(
        &self,
        endpoint: Url,
        id_token: &str,
    ) -> impl Future<Output = Result<Url, Error>> + Send;

    /// `PUT` of `body` to a presigned URL. Returns the response text.
    fn upload(&self, url: Url, body: String) -> impl Future<Output = Result<String, Error>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// Transient user-facing notices (toasts).
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, message: &str, kind: NoticeKind);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        match kind {
            NoticeKind::Error => tracing::warn!(notice = %message, "Notice"),
            NoticeKind::Info | NoticeKind::Success => tracing::info!(notice = %message, "Notice"),
        }
    }
}

/// Loads and saves the per-user, per-page document in remote object storage.
///
/// Both directions are best-effort: failures are logged and replaced by the
/// fallback document (load) or dropped (save). Nothing is retried.
pub struct DocumentExchange<S, A, T, N> {
    config: ScratchpadConfig,
    session: SessionGuard<S, A>,
    transport: T,
    notifier: N,
}

impl<S, A, T, N> DocumentExchange<S, A, T, N>
where
    S: KeyValueStore,
    A: AddressBar,
    T: DocumentTransport,
    N: Notifier,
{
    #[must_use]
    pub fn new(
        config: ScratchpadConfig,
        session: SessionGuard<S, A>,
        transport: T,
        notifier: N,
    ) -> Self {
        Self {
            config,
            session,
            transport,
            notifier,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ScratchpadConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionGuard<S, A> {
        &self.session
    }

    pub(crate) fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Login URL that returns to the current page.
    #[must_use]
    pub fn login_url(&self) -> Url {
        self.config.login_url(&self.session.location())
    }

    /// Document to start the session with.
    ///
    /// Logged-out visitors get the fallback document and a login notice.
    /// Logged-in visitors get their stored copy, or the fallback if it
    /// cannot be fetched or parsed.
    pub async fn load_starting_document(&self) -> JsonValue {
        let SessionState::LoggedIn(claims) = self.session.check_session() else {
            self.notify_login("to save/read from ScratchPad. Working locally for now...");
            return self.config.fallback_document.clone();
        };

        match self.fetch(&claims).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, email = %claims.email, "Falling back to default document");
                self.config.fallback_document.clone()
            }
        }
    }

    /// Mirrors `document` to remote storage when logged in.
    ///
    /// Never fails: the local copy is authoritative and remote errors are
    /// only logged.
    pub async fn save_document(&self, document: &JsonValue) {
        let SessionState::LoggedIn(claims) = self.session.check_session() else {
            tracing::info!("User not logged in");
            self.notify_login("to save to ScratchPad. Saving locally...");
            return;
        };

        if let Err(e) = self.push(&claims, document).await {
            tracing::warn!(error = %e, email = %claims.email, "Remote save failed");
        }
    }

    async fn fetch(&self, claims: &Claims) -> Result<JsonValue, Error> {
        let key = naming::document_key(&claims.email, &self.session.location());
        // Concatenate, not `join`: a key starting with `/` stays under the base.
        let mut url: Url = format!("{}{key}", self.config.document_url).parse()?;
        let cache_buster: f64 = rand::rng().random::<f64>() * 1000.0;
        url.query_pairs_mut()
            .append_pair("v", &cache_buster.to_string());

        self.transport.fetch_document(url).await
    }

    async fn push(&self, claims: &Claims, document: &JsonValue) -> Result<(), Error> {
        let id_token = self
            .session
            .stored_id_token()
            .ok_or_else(|| Error::Token("missing id_token".into()))?;
        let key = naming::document_key(&claims.email, &self.session.location());

        let mut endpoint = self.config.upload_url_endpoint.clone();
        endpoint
            .query_pairs_mut()
            .append_pair("filename", &key)
            .append_pair("filetype", DOCUMENT_CONTENT_TYPE);

        let upload_url = self.transport.request_upload_url(endpoint, &id_token).await?;
        let body = serde_json::to_string(document)?;
        let response = self.transport.upload(upload_url, body).await?;

        tracing::info!(key = %key, response = %response, "Document saved to ScratchPad");
        Ok(())
    }

    fn notify_login(&self, suffix: &str) {
        let message = format!(r#"<a href="{}">Sign up/login</a> {suffix}"#, self.login_url());
        self.notifier.notify(&message, NoticeKind::Info);
    }
}
