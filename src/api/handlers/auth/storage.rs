//! PostgreSQL-backed credential and session stores.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::credentials::{CredentialStore, password_digest};
use super::session::{SessionRecord, SessionStore};

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or replace the credential record for `username`.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn upsert_user(&self, username: &str, password: &str) -> Result<()> {
        let query = r"
            INSERT INTO users (username, password_digest)
            VALUES ($1, $2)
            ON CONFLICT (username) DO UPDATE SET password_digest = EXCLUDED.password_digest
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(username)
            .bind(password_digest(password))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to upsert user")?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn password_digest(&self, username: &str) -> Result<Option<Vec<u8>>> {
        let query = "SELECT password_digest FROM users WHERE username = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup credential record")?;

        Ok(row.map(|row| row.get("password_digest")))
    }
}

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session_hash: &[u8], username: &str, ttl_seconds: i64) -> Result<bool> {
        self.purge_expired().await?;

        let query = r"
            INSERT INTO user_sessions (session_hash, username, expires_at)
            VALUES ($1, $2, NOW() + ($3::float8 * INTERVAL '1 second'))
            ON CONFLICT (session_hash) DO NOTHING
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(session_hash)
            .bind(username)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert session")?;

        Ok(result.rows_affected() == 1)
    }

    async fn lookup(&self, session_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT username
            FROM user_sessions
            WHERE session_hash = $1
              AND expires_at > NOW()
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(session_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        Ok(row.map(|row| SessionRecord {
            username: row.get("username"),
        }))
    }

    async fn purge_expired(&self) -> Result<u64> {
        let query = "DELETE FROM user_sessions WHERE expires_at <= NOW()";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to purge expired sessions")?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, session_hash: &[u8]) -> Result<()> {
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }
}
