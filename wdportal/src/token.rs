//! Anti-forgery token handling for the portal's CSRF exchange
//!
//! The portal hands out a `CSRF-Token` cookie and expects the value echoed
//! back on later requests. GET requests bootstrap the exchange: until a
//! token has been captured they carry the placeholder value `Fetch`, which
//! asks the portal to issue one. State-changing requests echo the token in
//! the `X-CSRF-Token` header instead.

use std::sync::RwLock;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use tracing::debug;

/// Cookie name, and header name on GET requests
pub const CSRF_TOKEN_NAME: &str = "CSRF-Token";
/// Header name on state-changing requests
pub const CSRF_TOKEN_HEADER: &str = "X-CSRF-Token";
/// Placeholder a GET sends before any token has been captured
const CSRF_FETCH: &str = "Fetch";

/// Strategy for stamping anti-forgery material onto outgoing requests
///
/// Injected into service clients so the session store can be shared, and
/// so portals with CSRF protection disabled can run with [`NoTokens`].
pub trait TokenProvider: Send + Sync {
    /// Stamps token headers for a request with the given method
    fn apply(&self, method: &Method, headers: &mut HeaderMap);

    /// Captures rotated token material from a response
    fn absorb(&self, _headers: &HeaderMap) {}
}

/// Stamps nothing, for portals running without CSRF protection
#[derive(Debug, Default)]
pub struct NoTokens;

impl TokenProvider for NoTokens {
    fn apply(&self, _method: &Method, _headers: &mut HeaderMap) {}
}

/// In-memory session store implementing the portal's CSRF exchange
#[derive(Debug, Default)]
pub struct SessionTokens {
    csrf: RwLock<Option<String>>,
}

impl SessionTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently held token, if one has been captured
    pub fn csrf_token(&self) -> Option<String> {
        self.csrf.read().ok().and_then(|token| token.clone())
    }
}

impl TokenProvider for SessionTokens {
    fn apply(&self, method: &Method, headers: &mut HeaderMap) {
        let token = self.csrf_token();
        let (name, value) = if method == Method::GET {
            (
                CSRF_TOKEN_NAME,
                token.unwrap_or_else(|| CSRF_FETCH.to_string()),
            )
        } else {
            (CSRF_TOKEN_HEADER, token.unwrap_or_default())
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }

    fn absorb(&self, headers: &HeaderMap) {
        for cookie in headers.get_all(SET_COOKIE) {
            let Ok(cookie) = cookie.to_str() else {
                continue;
            };
            let Some(value) = cookie
                .strip_prefix(CSRF_TOKEN_NAME)
                .and_then(|rest| rest.strip_prefix('='))
            else {
                continue;
            };
            let value = value.split(';').next().unwrap_or(value).trim();
            if value.is_empty() {
                continue;
            }
            debug!("captured rotated CSRF token");
            if let Ok(mut slot) = self.csrf.write() {
                *slot = Some(value.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn absorb_cookie(tokens: &SessionTokens, cookie: &str) {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_str(cookie).unwrap());
        tokens.absorb(&headers);
    }

    #[test]
    fn get_requests_ask_for_a_token_first() {
        let tokens = SessionTokens::new();
        let mut headers = HeaderMap::new();
        tokens.apply(&Method::GET, &mut headers);
        assert_eq!(headers.get(CSRF_TOKEN_NAME).unwrap(), "Fetch");
    }

    #[test]
    fn get_requests_echo_a_captured_token() {
        let tokens = SessionTokens::new();
        absorb_cookie(&tokens, "CSRF-Token=abc123; Path=/; HttpOnly");
        let mut headers = HeaderMap::new();
        tokens.apply(&Method::GET, &mut headers);
        assert_eq!(headers.get(CSRF_TOKEN_NAME).unwrap(), "abc123");
    }

    #[test]
    fn state_changing_requests_use_the_x_header() {
        let tokens = SessionTokens::new();
        absorb_cookie(&tokens, "CSRF-Token=abc123");
        let mut headers = HeaderMap::new();
        tokens.apply(&Method::POST, &mut headers);
        assert_eq!(headers.get(CSRF_TOKEN_HEADER).unwrap(), "abc123");
        assert!(headers.get(CSRF_TOKEN_NAME).is_none());
    }

    #[test]
    fn rotated_tokens_replace_older_ones() {
        let tokens = SessionTokens::new();
        absorb_cookie(&tokens, "CSRF-Token=first");
        absorb_cookie(&tokens, "CSRF-Token=second; Path=/");
        assert_eq!(tokens.csrf_token().as_deref(), Some("second"));
    }

    #[test]
    fn unrelated_cookies_are_ignored() {
        let tokens = SessionTokens::new();
        absorb_cookie(&tokens, "WMID=whatever; Path=/");
        absorb_cookie(&tokens, "CSRF-Token=");
        assert_eq!(tokens.csrf_token(), None);
    }

    #[test]
    fn no_tokens_stamps_nothing() {
        let mut headers = HeaderMap::new();
        NoTokens.apply(&Method::GET, &mut headers);
        NoTokens.apply(&Method::POST, &mut headers);
        assert!(headers.is_empty());
    }
}
