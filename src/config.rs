use serde_json::Value as JsonValue;
use url::Url;

use crate::error::Error;

/// Client-side ScratchPad configuration.
///
/// Required fields are constructor parameters. Defaults point at the hosted
/// ScratchPad deployment; override them with the `with_*` methods.
///
/// ```rust,ignore
/// use scratchpad::ScratchpadConfig;
///
/// let config = ScratchpadConfig::new("my-client-id")
///     .with_document_storage_key("my-todo-app");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ScratchpadConfig {
    pub(crate) client_id: String,
    pub(crate) identity_url: Url,
    pub(crate) document_url: Url,
    pub(crate) upload_url_endpoint: Url,
    pub(crate) scopes: Vec<String>,
    pub(crate) token_storage_key: String,
    pub(crate) document_storage_key: String,
    pub(crate) fallback_document: JsonValue,
    pub(crate) log_data_on_save: bool,
}

impl ScratchpadConfig {
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            identity_url: "https://scratchpad.moogle.cc"
                .parse()
                .expect("valid default URL"),
            document_url: "https://moogle.cc/gallery/nirvaancms/attachments/"
                .parse()
                .expect("valid default URL"),
            upload_url_endpoint: "https://api.moogle.cc/p/tools/psu"
                .parse()
                .expect("valid default URL"),
            scopes: vec!["email".into(), "openid".into()],
            token_storage_key: "userdetails".into(),
            document_storage_key: "remake-demo-todo-app".into(),
            fallback_document: default_document(),
            log_data_on_save: false,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `SCRATCHPAD_CLIENT_ID`: identity provider client ID
    ///
    /// # Optional env vars
    /// - `SCRATCHPAD_LOGIN_URL`: identity provider base URL
    /// - `SCRATCHPAD_DOCUMENT_URL`: public-read base URL of stored documents
    /// - `SCRATCHPAD_PSU_URL`: presigned-upload-URL endpoint
    /// - `SCRATCHPAD_DOCUMENT_KEY`: local storage key of the document
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the client ID is missing or a URL is invalid.
    pub fn from_env() -> Result<Self, Error> {
        let client_id = std::env::var("SCRATCHPAD_CLIENT_ID")
            .map_err(|_| Error::Config("SCRATCHPAD_CLIENT_ID is required".into()))?;

        let mut config = Self::new(client_id);

        if let Some(url) = env_url("SCRATCHPAD_LOGIN_URL")? {
            config = config.with_identity_url(url);
        }
        if let Some(url) = env_url("SCRATCHPAD_DOCUMENT_URL")? {
            config = config.with_document_url(url);
        }
        if let Some(url) = env_url("SCRATCHPAD_PSU_URL")? {
            config = config.with_upload_url_endpoint(url);
        }
        if let Ok(key) = std::env::var("SCRATCHPAD_DOCUMENT_KEY") {
            config = config.with_document_storage_key(key);
        }

        Ok(config)
    }

    /// Override the identity provider base URL.
    #[must_use]
    pub fn with_identity_url(mut self, url: Url) -> Self {
        self.identity_url = url;
        self
    }

    /// Override the base URL documents are publicly read from.
    ///
    /// A trailing `/` is added if missing so keys resolve beneath it.
    #[must_use]
    pub fn with_document_url(mut self, mut url: Url) -> Self {
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.document_url = url;
        self
    }

    /// Override the presigned-upload-URL endpoint.
    #[must_use]
    pub fn with_upload_url_endpoint(mut self, url: Url) -> Self {
        self.upload_url_endpoint = url;
        self
    }

    /// Override the requested scopes (default: `["email", "openid"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_token_storage_key(mut self, key: impl Into<String>) -> Self {
        self.token_storage_key = key.into();
        self
    }

    #[must_use]
    pub fn with_document_storage_key(mut self, key: impl Into<String>) -> Self {
        self.document_storage_key = key.into();
        self
    }

    /// Document used when nothing better can be loaded.
    #[must_use]
    pub fn with_fallback_document(mut self, document: JsonValue) -> Self {
        self.fallback_document = document;
        self
    }

    #[must_use]
    pub fn with_log_data_on_save(mut self, enabled: bool) -> Self {
        self.log_data_on_save = enabled;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn document_url(&self) -> &Url {
        &self.document_url
    }

    #[must_use]
    pub fn upload_url_endpoint(&self) -> &Url {
        &self.upload_url_endpoint
    }

    #[must_use]
    pub fn token_storage_key(&self) -> &str {
        &self.token_storage_key
    }

    #[must_use]
    pub fn document_storage_key(&self) -> &str {
        &self.document_storage_key
    }

    #[must_use]
    pub fn fallback_document(&self) -> &JsonValue {
        &self.fallback_document
    }

    #[must_use]
    pub fn log_data_on_save(&self) -> bool {
        self.log_data_on_save
    }

    /// Implicit-grant login URL that redirects back to `location`.
    ///
    /// The redirect target is the page's origin and path, trailing slashes
    /// removed; query and fragment are dropped.
    #[must_use]
    pub fn login_url(&self, location: &Url) -> Url {
        let origin = location.origin().ascii_serialization();
        let path = location.path().trim_end_matches('/');
        let redirect_uri = format!("{origin}{path}");

        let mut url = self.identity_url.clone();
        url.set_path("/login");
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "token")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("redirect_uri", &redirect_uri);
        url
    }
}

/// Starting document of the to-do demo.
#[must_use]
pub fn default_document() -> JsonValue {
    serde_json::json!({
        "todos": [
            {"text": "Get a cat [dummy]"},
            {"text": "Buy a rocket ship [dummy]"},
            {"text": "Go to Mars [dummy]"}
        ]
    })
}

fn env_url(name: &str) -> Result<Option<Url>, Error> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_uses_implicit_grant() {
        let config = ScratchpadConfig::new("client-1");
        let url = config.login_url(&"https://x.io/demo/?a=1#frag".parse().unwrap());

        assert_eq!(url.path(), "/login");
        let query = url.query().unwrap();
        assert!(query.contains("client_id=client-1"));
        assert!(query.contains("response_type=token"));
        assert!(query.contains("scope=email+openid"));
        assert!(query.ends_with("redirect_uri=https%3A%2F%2Fx.io%2Fdemo"));
    }

    #[test]
    fn root_redirect_has_no_trailing_slash() {
        let config = ScratchpadConfig::new("c");
        let url = config.login_url(&"http://localhost:8080/".parse().unwrap());
        let redirect = url
            .query_pairs()
            .find(|(k, _)| k == "redirect_uri")
            .map(|(_, v)| v.into_owned());
        assert_eq!(redirect.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn document_url_gets_trailing_slash() {
        let config = ScratchpadConfig::new("c")
            .with_document_url("https://cdn.example.com/docs".parse().unwrap());
        assert_eq!(config.document_url().as_str(), "https://cdn.example.com/docs/");
    }

    #[test]
    fn defaults() {
        let config = ScratchpadConfig::new("c");
        assert_eq!(config.token_storage_key(), "userdetails");
        assert_eq!(config.document_storage_key(), "remake-demo-todo-app");
        assert_eq!(config.fallback_document()["todos"].as_array().map(Vec::len), Some(3));
    }
}
