//! Password verification against the credential store.
//!
//! The store only ever sees a SHA-256 digest of the password. Verification
//! digests the presented password, fetches the stored digest, and compares the
//! two in constant time. Unknown usernames are compared against a fixed digest
//! so both outcomes run the same comparison.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::utils::constant_time_eq;

/// Lookup of stored password digests by username.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Return the stored digest, or `None` when the username is unknown.
    async fn password_digest(&self, username: &str) -> Result<Option<Vec<u8>>>;
}

/// Digest a password the same way provisioning does.
#[must_use]
pub fn password_digest(password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("credential store unavailable")]
    Store(#[source] anyhow::Error),
}

/// Proof that a username/password pair matched the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    username: String,
}

impl Authorized {
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Check `password` against the stored digest for `username`.
    ///
    /// # Errors
    /// `InvalidCredentials` when the user is unknown or the digest differs,
    /// `Store` when the lookup itself fails.
    #[instrument(skip(self, password))]
    pub async fn verify(&self, username: &str, password: &str) -> Result<Authorized, VerifyError> {
        let computed = password_digest(password);
        let stored = self
            .store
            .password_digest(username)
            .await
            .map_err(VerifyError::Store)?;

        let (expected, known) = match stored {
            Some(digest) => (digest, true),
            None => (vec![0u8; computed.len()], false),
        };

        if constant_time_eq(&computed, &expected) && known {
            Ok(Authorized {
                username: username.to_string(),
            })
        } else {
            debug!("credential mismatch");
            Err(VerifyError::InvalidCredentials)
        }
    }
}

/// In-process credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the digest of `password` for `username`, replacing any previous one.
    pub async fn insert(&self, username: &str, password: &str) {
        self.users
            .write()
            .await
            .insert(username.to_string(), password_digest(password));
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn password_digest(&self, username: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.users.read().await.get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct BrokenStore;

    #[async_trait]
    impl CredentialStore for BrokenStore {
        async fn password_digest(&self, _username: &str) -> Result<Option<Vec<u8>>> {
            Err(anyhow!("connection refused"))
        }
    }

    async fn verifier() -> CredentialVerifier {
        let store = MemoryCredentialStore::new();
        store.insert("alice", "secret").await;
        store.insert("packt", "kk").await;
        CredentialVerifier::new(Arc::new(store))
    }

    #[test]
    fn password_digest_depends_on_input() {
        assert_eq!(password_digest("secret"), password_digest("secret"));
        assert_ne!(password_digest("secret"), password_digest("secreT"));
        assert_ne!(password_digest(""), password_digest("gg"));
        assert_eq!(password_digest("secret").len(), 32);
    }

    #[tokio::test]
    async fn verify_accepts_matching_password_repeatedly() {
        let verifier = verifier().await;
        for _ in 0..3 {
            let authorized = verifier.verify("alice", "secret").await;
            assert!(matches!(&authorized, Ok(auth) if auth.username() == "alice"));
        }
    }

    #[tokio::test]
    async fn verify_rejects_wrong_password() {
        let verifier = verifier().await;
        assert!(matches!(
            verifier.verify("alice", "wrong").await,
            Err(VerifyError::InvalidCredentials)
        ));
        // Another user's valid password is still wrong for alice.
        assert!(matches!(
            verifier.verify("alice", "kk").await,
            Err(VerifyError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn verify_rejects_unknown_user() {
        let verifier = verifier().await;
        assert!(matches!(
            verifier.verify("mallory", "secret").await,
            Err(VerifyError::InvalidCredentials)
        ));
        assert!(matches!(
            verifier.verify("mallory", "").await,
            Err(VerifyError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn verify_reports_store_failure() {
        let verifier = CredentialVerifier::new(Arc::new(BrokenStore));
        assert!(matches!(
            verifier.verify("alice", "secret").await,
            Err(VerifyError::Store(_))
        ));
    }
}
