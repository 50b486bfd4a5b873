use super::server::connect;
use crate::api::auth::PgCredentialStore;
use anyhow::{Result, anyhow};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub username: String,
    pub password: SecretString,
}

/// Insert or replace the credential record for one user.
/// # Errors
/// Returns an error if the input is empty, the database is unreachable, or the write fails.
pub async fn execute(args: Args) -> Result<()> {
    let username = args.username.trim();
    if !crate::api::auth::valid_username(username) {
        return Err(anyhow!("invalid username: {username}"));
    }
    if args.password.expose_secret().is_empty() {
        return Err(anyhow!("password must not be empty"));
    }

    let pool = connect(&args.dsn).await?;
    PgCredentialStore::new(pool)
        .upsert_user(username, args.password.expose_secret())
        .await?;

    info!(username, "credentials provisioned");
    println!("Provisioned user {username}");

    Ok(())
}
