use std::borrow::Cow;

use super::{GatewayRequest, GatewayResponse, UploadPresigner};
use crate::error::Error;
use crate::exchange::UploadUrlResponse;
use crate::naming::{hyphenate, strip_non_alphanumeric};
use crate::token::decode_payload_json;

/// Where presigned uploads land.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PresignConfig {
    pub bucket: String,
    /// Key prefix, without a trailing `/`.
    pub prefix: String,
}

impl PresignConfig {
    #[must_use]
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `DESTINATION_BUCKET`: bucket uploads are signed for
    /// - `JSON_STORE_PREFIX`: key prefix for stored documents
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either variable is missing.
    pub fn from_env() -> Result<Self, Error> {
        let bucket = std::env::var("DESTINATION_BUCKET")
            .map_err(|_| Error::Config("DESTINATION_BUCKET is required".into()))?;
        let prefix = std::env::var("JSON_STORE_PREFIX")
            .map_err(|_| Error::Config("JSON_STORE_PREFIX is required".into()))?;
        Ok(Self::new(bucket, prefix))
    }
}

/// Storage key for `filename` uploaded by `email`: `{prefix}/{email}/{filename}`.
///
/// The filename is percent-decoded once more before cleaning, since clients
/// encode it into the query themselves.
///
/// # Errors
///
/// Returns `Error::Token` if the email has no alphanumeric characters.
pub fn upload_key(prefix: &str, email: &str, filename: &str) -> Result<String, Error> {
    let user = strip_non_alphanumeric(email);
    if user.is_empty() {
        return Err(Error::Token("missing email claim".into()));
    }
    let decoded = urlencoding::decode(filename).unwrap_or(Cow::Borrowed(filename));
    Ok(format!("{prefix}/{user}/{}", hyphenate(&decoded)))
}

/// Handler: presigned upload URL for the caller identified by the
/// `Authorization` JWT.
///
/// Responds `200` with `{"psu": url}`, or the generic `400` on any failure.
pub async fn presign_upload<P: UploadPresigner>(
    config: &PresignConfig,
    presigner: &P,
    request: &GatewayRequest,
) -> GatewayResponse {
    tracing::debug!(?request, "Presigned upload request");

    let response = issue(config, presigner, request)
        .await
        .and_then(|psu| GatewayResponse::ok(&UploadUrlResponse { psu }));

    response.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Presigned upload request failed");
        GatewayResponse::failure()
    })
}

async fn issue<P: UploadPresigner>(
    config: &PresignConfig,
    presigner: &P,
    request: &GatewayRequest,
) -> Result<String, Error> {
    let token = request
        .header("Authorization")
        .ok_or_else(|| Error::Token("missing Authorization header".into()))?;
    let claims = decode_payload_json(token)?;
    let email = claims
        .get("email")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Token("missing claim: email".into()))?;
    let filename = request
        .query("filename")
        .ok_or_else(|| Error::Config("missing filename parameter".into()))?;

    let key = upload_key(&config.prefix, email, filename)?;
    let url = presigner
        .presign_put(&config.bucket, &key, request.query("filetype"))
        .await?;

    tracing::info!(key = %key, "Issued presigned upload URL");
    Ok(url.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use url::Url;

    use super::*;
    use crate::token::tests::make_jwt;

    /// Presigner that signs nothing and records what it was asked for.
    #[derive(Default)]
    pub(crate) struct FakePresigner {
        pub(crate) requests: Mutex<Vec<(String, String, Option<String>)>>,
        pub(crate) fail: bool,
    }

    impl UploadPresigner for FakePresigner {
        async fn presign_put(
            &self,
            bucket: &str,
            key: &str,
            content_type: Option<&str>,
        ) -> Result<Url, Error> {
            if self.fail {
                return Err(Error::Collaborator("signing unavailable".into()));
            }
            self.requests.lock().unwrap().push((
                bucket.to_owned(),
                key.to_owned(),
                content_type.map(ToOwned::to_owned),
            ));
            Ok(format!("https://{bucket}.s3.amazonaws.com/{key}?X-Amz-Signature=abc").parse()?)
        }
    }

    pub(crate) fn request(token: Option<&str>, params: &[(&str, &str)]) -> GatewayRequest {
        GatewayRequest {
            headers: token
                .map(|t| HashMap::from([("Authorization".to_owned(), t.to_owned())]))
                .unwrap_or_default(),
            query_string_parameters: params
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        }
    }

    fn config() -> PresignConfig {
        PresignConfig::new("docs-bucket", "json/store")
    }

    #[test]
    fn key_cleans_email_and_filename() {
        assert_eq!(
            upload_key("p", "Jane.Doe+1@x.com", "My File!.json").unwrap(),
            "p/JaneDoe1xcom/My-File-.json"
        );
        assert_eq!(
            upload_key("p", "a@b.com", "abcom%2Fx.io-app.html.json").unwrap(),
            "p/abcom/abcom-x.io-app.html.json"
        );
        assert!(upload_key("p", "@.", "x").is_err());
    }

    #[test]
    fn undecodable_filename_is_cleaned_as_is() {
        assert_eq!(upload_key("p", "a@b.com", "100%.json").unwrap(), "p/abcom/100-.json");
    }

    #[tokio::test]
    async fn issues_url_for_token_email() {
        let presigner = FakePresigner::default();
        let token = make_jwt(&serde_json::json!({"email": "Jane.Doe+1@x.com"}));
        let request = request(
            Some(&token),
            &[("filename", "My File!.json"), ("filetype", "application/json")],
        );

        let response = presign_upload(&config(), &presigner, &request).await;

        assert_eq!(response.status_code, 200);
        let body: UploadUrlResponse = serde_json::from_str(&response.body).unwrap();
        assert!(body.psu.contains("json/store/JaneDoe1xcom/My-File-.json"));
        assert_eq!(
            presigner.requests.lock().unwrap().as_slice(),
            &[(
                "docs-bucket".to_owned(),
                "json/store/JaneDoe1xcom/My-File-.json".to_owned(),
                Some("application/json".to_owned())
            )]
        );
    }

    #[tokio::test]
    async fn missing_authorization_is_rejected() {
        let presigner = FakePresigner::default();
        let response =
            presign_upload(&config(), &presigner, &request(None, &[("filename", "a.json")])).await;
        assert_eq!(response, GatewayResponse::failure());
        assert!(presigner.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_token_is_rejected() {
        let response = presign_upload(
            &config(),
            &FakePresigner::default(),
            &request(Some("not-a-jwt"), &[("filename", "a.json")]),
        )
        .await;
        assert_eq!(response.status_code, 400);
    }

    #[tokio::test]
    async fn presigner_failure_is_rejected() {
        let presigner = FakePresigner {
            fail: true,
            ..FakePresigner::default()
        };
        let token = make_jwt(&serde_json::json!({"email": "a@b.com"}));
        let response =
            presign_upload(&config(), &presigner, &request(Some(&token), &[("filename", "a")])).await;
        assert_eq!(response.status_code, 400);
    }
}
