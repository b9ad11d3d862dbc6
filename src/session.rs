use std::sync::Mutex;

use time::OffsetDateTime;
use url::Url;

use crate::store::{KeyValueStore, TokenStore};
use crate::token::{Claims, TokenBundle};

/// The page's visible address.
///
/// `replace` swaps the shown URL without navigating, like
/// `history.replaceState`.
pub trait AddressBar: Send + Sync + 'static {
    fn current(&self) -> Url;

    fn replace(&self, url: Url);
}

impl<T: AddressBar> AddressBar for std::sync::Arc<T> {
    fn current(&self) -> Url {
        (**self).current()
    }

    fn replace(&self, url: Url) {
        (**self).replace(url);
    }
}

/// Address bar held in memory, for hosts without a browser and for tests.
#[derive(Debug)]
pub struct MemoryAddressBar {
    url: Mutex<Url>,
}

impl MemoryAddressBar {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self { url: Mutex::new(url) }
    }
}

impl AddressBar for MemoryAddressBar {
    fn current(&self) -> Url {
        self.url.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn replace(&self, url: Url) {
        *self.url.lock().unwrap_or_else(|e| e.into_inner()) = url;
    }
}

/// Authentication status derived on every check.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn(Claims),
}

impl SessionState {
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn(_))
    }

    #[must_use]
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            Self::LoggedIn(claims) => Some(claims),
            Self::LoggedOut => None,
        }
    }
}

/// Decides whether the visitor is logged in.
///
/// A fresh login arrives as `#id_token=...&access_token=...` on the redirect
/// URL; a returning visit finds the bundle in the [`TokenStore`]. The
/// fragment is consumed on first sight, so repeated checks only see storage.
pub struct SessionGuard<S, A> {
    tokens: TokenStore<S>,
    address: A,
}

impl<S: KeyValueStore, A: AddressBar> SessionGuard<S, A> {
    #[must_use]
    pub fn new(tokens: TokenStore<S>, address: A) -> Self {
        Self { tokens, address }
    }

    /// Checks the session against the current time.
    pub fn check_session(&self) -> SessionState {
        let now = OffsetDateTime::now_utc();
        let now_millis = i64::try_from(now.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX);
        self.check_session_at(now_millis)
    }

    /// Checks the session at `now_millis` (milliseconds since the Unix epoch).
    ///
    /// A fragment bundle is always stripped from the address bar. A fresh
    /// bundle is persisted; a stale or undecodable one evicts whatever is
    /// stored.
    pub fn check_session_at(&self, now_millis: i64) -> SessionState {
        let from_url = self.take_fragment_bundle();
        let Some(bundle) = from_url.or_else(|| self.tokens.load()) else {
            return SessionState::LoggedOut;
        };
        if bundle.id_token.is_none() {
            return SessionState::LoggedOut;
        }

        match bundle.claims() {
            Ok(claims) if claims.is_fresh_at(now_millis) => {
                if let Err(e) = self.tokens.save(&bundle) {
                    tracing::warn!(error = %e, "Failed to persist token bundle");
                }
                SessionState::LoggedIn(claims)
            }
            result => {
                match result {
                    Ok(claims) => tracing::debug!(exp = claims.exp, "Token bundle expired"),
                    Err(e) => tracing::warn!(error = %e, "Discarding undecodable token bundle"),
                }
                if self.tokens.contains() {
                    if let Err(e) = self.tokens.clear() {
                        tracing::warn!(error = %e, "Failed to evict token bundle");
                    }
                }
                SessionState::LoggedOut
            }
        }
    }

    /// Claims of the stored bundle, without freshness checks or side effects.
    #[must_use]
    pub fn stored_claims(&self) -> Option<Claims> {
        self.tokens.load()?.claims().ok()
    }

    /// Raw `id_token` of the stored bundle, sent as the upload credential.
    #[must_use]
    pub fn stored_id_token(&self) -> Option<String> {
        self.tokens.load()?.id_token
    }

    /// Current page location, fragment included.
    #[must_use]
    pub fn location(&self) -> Url {
        self.address.current()
    }

    fn take_fragment_bundle(&self) -> Option<TokenBundle> {
        let mut location = self.address.current();
        let bundle = location.fragment().and_then(TokenBundle::from_fragment)?;
        location.set_fragment(None);
        self.address.replace(location);
        Some(bundle)
    }
}
