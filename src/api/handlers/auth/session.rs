//! Session issuance, lookup, and teardown for the cookie credential.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header::InvalidHeaderValue};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::utils::{
    SESSION_COOKIE_NAME, extract_session_token, generate_session_token, hash_session_token,
};

const ESTABLISH_ATTEMPTS: usize = 3;

/// Minimal data returned for a valid session cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub username: String,
}

/// Backing store for session entries, keyed by the token hash.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new entry. Returns `false` if the hash is already taken.
    async fn insert(&self, session_hash: &[u8], username: &str, ttl_seconds: i64) -> Result<bool>;
    /// Resolve a live (unexpired) entry.
    async fn lookup(&self, session_hash: &[u8]) -> Result<Option<SessionRecord>>;
    /// Remove an entry; missing entries are not an error.
    async fn delete(&self, session_hash: &[u8]) -> Result<()>;
    /// Drop every expired entry and return how many were removed.
    /// Implementations also run this on each insert.
    async fn purge_expired(&self) -> Result<u64>;
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl_seconds: i64,
    cookie_secure: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, ttl_seconds: i64, cookie_secure: bool) -> Self {
        Self {
            store,
            ttl_seconds,
            cookie_secure,
        }
    }

    /// Issue a fresh session token for `username` and persist its hash.
    ///
    /// # Errors
    /// Returns an error if the RNG or the store fails, or if every attempt collided.
    #[instrument(skip(self))]
    pub async fn establish(&self, username: &str) -> Result<String> {
        for _ in 0..ESTABLISH_ATTEMPTS {
            let token = generate_session_token()?;
            let token_hash = hash_session_token(&token);
            if self
                .store
                .insert(&token_hash, username, self.ttl_seconds)
                .await?
            {
                debug!("session established");
                return Ok(token);
            }
            warn!("session token collision, retrying");
        }
        Err(anyhow!("failed to allocate a unique session token"))
    }

    /// Resolve the session attached to the request, if any.
    ///
    /// # Errors
    /// Returns an error only when the store lookup fails.
    pub async fn current(&self, headers: &HeaderMap) -> Result<Option<SessionRecord>> {
        let Some(token) = extract_session_token(headers) else {
            return Ok(None);
        };
        self.store.lookup(&hash_session_token(&token)).await
    }

    /// Remove the session attached to the request. Clearing an empty session is a no-op.
    ///
    /// # Errors
    /// Returns an error when the store delete fails.
    #[instrument(skip(self, headers))]
    pub async fn clear(&self, headers: &HeaderMap) -> Result<()> {
        if let Some(token) = extract_session_token(headers) {
            self.store.delete(&hash_session_token(&token)).await?;
            debug!("session cleared");
        }
        Ok(())
    }

    /// Remove the session behind a token this process issued, such as one
    /// established for a sign-in that did not complete.
    ///
    /// # Errors
    /// Returns an error when the store delete fails.
    #[instrument(skip_all)]
    pub async fn discard(&self, token: &str) -> Result<()> {
        self.store.delete(&hash_session_token(token)).await
    }

    /// Build a secure `HttpOnly` cookie for the session token.
    ///
    /// # Errors
    /// Returns an error if the token contains bytes not allowed in a header.
    pub fn session_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl_seconds
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    /// Cookie that makes the client drop its session token.
    ///
    /// # Errors
    /// Never fails in practice; the value is a fixed string.
    pub fn clear_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

struct MemorySession {
    username: String,
    expires_at: DateTime<Utc>,
}

/// In-process session store with lazy eviction of expired entries.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Vec<u8>, MemorySession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored (possibly expired) entries.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session_hash: &[u8], username: &str, ttl_seconds: i64) -> Result<bool> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, entry| entry.expires_at > now);
        if sessions.contains_key(session_hash) {
            return Ok(false);
        }
        let expires_at = Duration::try_seconds(ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .context("session ttl is out of range")?;
        sessions.insert(
            session_hash.to_vec(),
            MemorySession {
                username: username.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn lookup(&self, session_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        match sessions.get(session_hash) {
            Some(entry) if entry.expires_at > now => Ok(Some(SessionRecord {
                username: entry.username.clone(),
            })),
            Some(_) => {
                sessions.remove(session_hash);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, session_hash: &[u8]) -> Result<()> {
        self.sessions.lock().await.remove(session_hash);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        Ok(u64::try_from(before - sessions.len())?)
    }
}
