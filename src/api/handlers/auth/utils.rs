//! Small helpers for token generation, hashing, and header parsing.

use anyhow::{Context, Result};
use axum::http::{
    HeaderMap,
    header::{AUTHORIZATION, COOKIE},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use subtle::ConstantTimeEq;

pub(crate) const SESSION_COOKIE_NAME: &str = "recipes_session";

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the store keeps a hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token so raw values never touch the store.
/// The hash is used for lookups when the cookie is presented.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Compare two byte strings without short-circuiting on the first mismatch.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

static USERNAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.@-]{1,64}$").ok());

/// Usernames are 1-64 characters of `[A-Za-z0-9_.@-]`.
pub(crate) fn valid_username(username: &str) -> bool {
    USERNAME_PATTERN
        .as_ref()
        .is_some_and(|regex| regex.is_match(username))
}

/// Read the session token from the `recipes_session` cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

/// Read the signed token from `Authorization`, either raw or as
/// `Bearer <token>`. The scheme must be followed by whitespace.
pub(crate) fn extract_authorization_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => value,
    };
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn generate_session_token_is_32_bytes() {
        let decoded_len = generate_session_token()
            .ok()
            .and_then(|token| Base64UrlUnpadded::decode_vec(&token).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn hash_session_token_stable() {
        let first = hash_session_token("token");
        let second = hash_session_token("token");
        let different = hash_session_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn constant_time_eq_matches_only_identical_input() {
        assert!(constant_time_eq(b"digest", b"digest"));
        assert!(!constant_time_eq(b"digest", b"digesT"));
        assert!(!constant_time_eq(b"Digest", b"digest"));
        assert!(!constant_time_eq(b"short", b"longer"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn valid_username_rules() {
        assert!(valid_username("alice"));
        assert!(valid_username("mlabouardy"));
        assert!(valid_username("a.b-c_d@example.com"));
        assert!(!valid_username(""));
        assert!(!valid_username("has space"));
        assert!(!valid_username(&"x".repeat(65)));
        assert!(valid_username(&"x".repeat(64)));
        assert!(!valid_username("alice\n"));
    }

    #[test]
    fn extract_session_token_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; recipes_session=abc123 ; other=1"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_session_token_ignores_empty_or_missing() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);
        headers.insert(COOKIE, HeaderValue::from_static("recipes_session="));
        assert_eq!(extract_session_token(&headers), None);
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn extract_authorization_token_accepts_raw_and_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("a.b.c"));
        assert_eq!(extract_authorization_token(&headers), Some("a.b.c".to_string()));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer a.b.c"));
        assert_eq!(extract_authorization_token(&headers), Some("a.b.c".to_string()));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_authorization_token(&headers), None);
    }

    #[test]
    fn extract_authorization_token_needs_space_after_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearerxyz.a.b"));
        assert_eq!(
            extract_authorization_token(&headers),
            Some("Bearerxyz.a.b".to_string())
        );
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer\ta.b.c"));
        assert_eq!(extract_authorization_token(&headers), Some("a.b.c".to_string()));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("BEARER   a.b.c"));
        assert_eq!(extract_authorization_token(&headers), Some("a.b.c".to_string()));
    }
}
