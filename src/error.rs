#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Token error: {0}")]
    Token(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} failed (status {status:?}): {detail}")]
    Remote {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}
