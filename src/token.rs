use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;

/// Token pair returned by the identity provider after an implicit-grant login.
///
/// Carried once in the redirect fragment, then kept in durable storage
/// between visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl TokenBundle {
    /// Create a bundle holding both tokens.
    #[must_use]
    pub fn new(id_token: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            id_token: Some(id_token.into()),
            access_token: Some(access_token.into()),
        }
    }

    /// Parses `id_token=...&access_token=...` from a URL fragment (without the `#`).
    ///
    /// Returns `None` when the fragment carries neither parameter. Empty
    /// values are kept as absent tokens.
    #[must_use]
    pub fn from_fragment(fragment: &str) -> Option<Self> {
        let mut bundle = Self {
            id_token: None,
            access_token: None,
        };
        let mut seen = false;
        for (name, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
            let slot = match name.as_ref() {
                "id_token" => &mut bundle.id_token,
                "access_token" => &mut bundle.access_token,
                _ => continue,
            };
            seen = true;
            *slot = Some(value.into_owned()).filter(|v| !v.is_empty());
        }
        seen.then_some(bundle)
    }

    /// Decodes the claims of the `id_token`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Token` if the bundle has no `id_token` or its payload is malformed.
    pub fn claims(&self) -> Result<Claims, Error> {
        let id_token = self
            .id_token
            .as_deref()
            .ok_or_else(|| Error::Token("missing id_token".into()))?;
        decode_claims(id_token)
    }
}

/// Identity claims carried by an `id_token`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub email: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Claims {
    /// Whether the token is still valid at `now_millis` (milliseconds since the epoch).
    #[must_use]
    pub fn is_fresh_at(&self, now_millis: i64) -> bool {
        self.exp.saturating_mul(1000) > now_millis
    }
}

/// Decodes the payload (middle segment) of a JWT without verifying its signature.
///
/// Freshness is the only property checked by callers; the signature is
/// verified by whoever consumes the token server-side.
///
/// # Errors
///
/// Returns `Error::Token` if the token does not have three segments or the
/// payload is not base64-encoded JSON with an `exp` claim.
pub fn decode_claims(token: &str) -> Result<Claims, Error> {
    let payload = decode_payload(token)?;
    serde_json::from_slice(&payload).map_err(|e| Error::Token(format!("invalid payload: {e}")))
}

/// Decodes the payload of a JWT into an arbitrary JSON object.
///
/// # Errors
///
/// Returns `Error::Token` if the payload segment is missing or not base64 JSON.
pub fn decode_payload_json(token: &str) -> Result<JsonValue, Error> {
    let payload = decode_payload(token)?;
    serde_json::from_slice(&payload).map_err(|e| Error::Token(format!("invalid payload: {e}")))
}

fn decode_payload(token: &str) -> Result<Vec<u8>, Error> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Token("invalid token format".into()));
    }

    // Providers disagree on alphabet and padding; accept either.
    let segment = parts[1].trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| STANDARD_NO_PAD.decode(segment))
        .map_err(|_| Error::Token("invalid payload encoding".into()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds an unsigned JWT around the given payload.
    pub(crate) fn make_jwt(payload: &JsonValue) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn decodes_email_and_exp() {
        let token = make_jwt(&serde_json::json!({"email": "a@b.com", "exp": 1_700_000_000, "sub": "u1"}));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.exp, 1_700_000_000);
        assert_eq!(claims.extra.get("sub").and_then(|v| v.as_str()), Some("u1"));
    }

    #[test]
    fn accepts_padded_standard_alphabet() {
        let body = base64::engine::general_purpose::STANDARD
            .encode(r#"{"email":"x?y@z.io","exp":5}"#);
        let token = format!("h.{body}.s");
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.email, "x?y@z.io");
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(decode_claims("only.two").is_err());
        assert!(decode_claims("a.b.c.d").is_err());
    }

    #[test]
    fn rejects_payload_without_exp() {
        let token = make_jwt(&serde_json::json!({"email": "a@b.com"}));
        assert!(decode_claims(&token).is_err());
    }

    #[test]
    fn freshness_compares_in_milliseconds() {
        let claims = Claims {
            email: String::new(),
            exp: 100,
            extra: Map::new(),
        };
        assert!(claims.is_fresh_at(99_999));
        assert!(!claims.is_fresh_at(100_000));
    }

    #[test]
    fn fragment_with_tokens() {
        let bundle = TokenBundle::from_fragment("id_token=abc&access_token=def&expires_in=3600").unwrap();
        assert_eq!(bundle, TokenBundle::new("abc", "def"));
    }

    #[test]
    fn fragment_with_empty_id_token() {
        let bundle = TokenBundle::from_fragment("id_token=&access_token=def").unwrap();
        assert_eq!(bundle.id_token, None);
        assert_eq!(bundle.access_token.as_deref(), Some("def"));

        let bundle = TokenBundle::from_fragment("id_token=").unwrap();
        assert_eq!(bundle.id_token, None);
        assert_eq!(bundle.access_token, None);
    }

    #[test]
    fn fragment_without_tokens_is_ignored() {
        assert!(TokenBundle::from_fragment("section-2").is_none());
        assert!(TokenBundle::from_fragment("").is_none());
    }

    #[test]
    fn bundle_without_id_token_has_no_claims() {
        let bundle = TokenBundle {
            id_token: None,
            access_token: Some("def".into()),
        };
        assert!(bundle.claims().is_err());
    }
}
