use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use super::presign::{PresignConfig, presign_upload};
use super::{GatewayRequest, GatewayResponse, UploadPresigner};

/// Shared state for the presign route.
struct PresignState<P> {
    config: Arc<PresignConfig>,
    presigner: Arc<P>,
}

// Manual Clone: avoid derive adding a `P: Clone` bound.
impl<P> Clone for PresignState<P> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            presigner: self.presigner.clone(),
        }
    }
}

/// Router serving the presigned-upload-URL handler at `GET {path}`.
///
/// ```rust,ignore
/// let app = axum::Router::new()
///     .merge(presign_routes("/p/tools/psu", PresignConfig::from_env()?, presigner));
/// ```
pub fn presign_routes<P>(path: &str, config: PresignConfig, presigner: P) -> Router
where
    P: UploadPresigner,
{
    let state = PresignState {
        config: Arc::new(config),
        presigner: Arc::new(presigner),
    };

    Router::new()
        .route(path, get(presign::<P>))
        .with_state(state)
}

// ── Presign ────────────────────────────────────────────────────────

async fn presign<P: UploadPresigner>(
    State(state): State<PresignState<P>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> GatewayResponse {
    let request = GatewayRequest {
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect(),
        query_string_parameters: params,
    };

    presign_upload(&state.config, state.presigner.as_ref(), &request).await
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST);
        let mut response = (status, self.body).into_response();

        let headers = response.headers_mut();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        for (name, value) in self.headers {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::exchange::UploadUrlResponse;
    use crate::handlers::presign::tests::FakePresigner;
    use crate::token::tests::make_jwt;

    fn app() -> Router {
        presign_routes(
            "/p/tools/psu",
            PresignConfig::new("docs-bucket", "json"),
            FakePresigner::default(),
        )
    }

    #[tokio::test]
    async fn serves_presigned_url() {
        let token = make_jwt(&serde_json::json!({"email": "a@b.com", "exp": 1}));
        let request = Request::get("/p/tools/psu?filename=abcom%2Fx.io-app.html.json&filetype=application%2Fjson")
            .header("Authorization", token)
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: UploadUrlResponse = serde_json::from_slice(&body).unwrap();
        assert!(body.psu.contains("json/abcom/abcom-x.io-app.html.json"));
    }

    #[tokio::test]
    async fn unauthenticated_request_gets_generic_failure() {
        let request = Request::get("/p/tools/psu?filename=a.json")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert_eq!(
            response.headers().get("access-control-allow-credentials").unwrap(),
            "true"
        );
    }
}
