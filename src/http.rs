use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value as JsonValue;
use url::Url;

use crate::error::Error;
use crate::exchange::{DocumentTransport, UploadUrlResponse};

/// Content type the presigned `PUT` is signed for.
const UPLOAD_CONTENT_TYPE: &str = "multipart/form-data";

/// [`DocumentTransport`] over HTTP(S) with reqwest.
///
/// No timeout is configured here; the client's defaults apply.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Remote {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

impl DocumentTransport for HttpTransport {
    async fn fetch_document(&self, url: Url) -> Result<JsonValue, Error> {
        let response = self.http.get(url).send().await?;
        let response = Self::ensure_success(response, "document load").await?;
        response.json::<JsonValue>().await.map_err(Into::into)
    }

    async fn request_upload_url(&self, endpoint: Url, id_token: &str) -> Result<Url, Error> {
        let response = self
            .http
            .get(endpoint)
            .header(AUTHORIZATION, id_token)
            .send()
            .await?;

        let response = Self::ensure_success(response, "upload URL request").await?;
        let body = response.json::<UploadUrlResponse>().await?;
        body.psu.parse().map_err(Into::into)
    }

    async fn upload(&self, url: Url, body: String) -> Result<String, Error> {
        let response = self
            .http
            .put(url)
            .header(CONTENT_TYPE, UPLOAD_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let response = Self::ensure_success(response, "document upload").await?;
        response.text().await.map_err(Into::into)
    }
}
