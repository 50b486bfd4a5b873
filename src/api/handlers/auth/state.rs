//! Auth state and configuration.

use anyhow::{Context, Result, bail};
use secrecy::SecretString;
use std::sync::Arc;

use super::credentials::{CredentialStore, CredentialVerifier};
use super::session::{SessionManager, SessionStore};
use super::token::{
    DEFAULT_REFRESH_WINDOW_SECONDS, DEFAULT_TOKEN_TTL_SECONDS, MAX_TTL_SECONDS, TokenSigner,
};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
    token_ttl_seconds: i64,
    refresh_window_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: false,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            refresh_window_seconds: DEFAULT_REFRESH_WINDOW_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_window_seconds(mut self, seconds: i64) -> Self {
        self.refresh_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_window_seconds(&self) -> i64 {
        self.refresh_window_seconds
    }
}

/// Everything the auth handlers and the gate need, built once at startup.
pub struct AuthState {
    config: AuthConfig,
    verifier: CredentialVerifier,
    sessions: SessionManager,
    signer: TokenSigner,
}

impl AuthState {
    /// # Errors
    /// Returns an error if the session TTL is outside `1..=MAX_TTL_SECONDS`
    /// or the token signer rejects the secret or the TTLs.
    pub fn new(
        config: AuthConfig,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        signing_secret: SecretString,
    ) -> Result<Self> {
        if !(1..=MAX_TTL_SECONDS).contains(&config.session_ttl_seconds()) {
            bail!("session ttl must be between 1 and {MAX_TTL_SECONDS} seconds");
        }
        let signer = TokenSigner::new(
            signing_secret,
            config.token_ttl_seconds(),
            config.refresh_window_seconds(),
        )
        .context("invalid token signer configuration")?;
        let sessions = SessionManager::new(
            sessions,
            config.session_ttl_seconds(),
            config.session_cookie_secure(),
        );
        Ok(Self {
            config,
            verifier: CredentialVerifier::new(credentials),
            sessions,
            signer,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }
}
