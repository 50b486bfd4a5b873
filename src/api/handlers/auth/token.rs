//! Signed, expiry-bearing tokens and the refresh protocol.
//!
//! Tokens use the JWT compact form with an HS256 signature:
//! `base64url(header).base64url(claims).base64url(hmac)`. Nothing is stored
//! server side; the signature is the only thing tying a token to this service.
//!
//! Refresh is deliberately narrow. A token may be renewed only when at most
//! `refresh_window` seconds remain before its expiry. Expired tokens with a
//! valid signature are still renewable.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

const ALG: &str = "HS256";
const TYP: &str = "JWT";

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 5 * 60;
pub const DEFAULT_REFRESH_WINDOW_SECONDS: i64 = 30;
/// Upper bound for any configured lifetime: one year.
pub const MAX_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("signing secret is not configured")]
    MissingSecret,
    #[error("token lifetime must be between one second and one year")]
    InvalidLifetime,
    #[error("refresh window must be positive and shorter than the token lifetime")]
    InvalidWindow,
    #[error("invalid signing key")]
    Key,
    #[error("expiry is out of range")]
    Timestamp,
    #[error("failed to encode token")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("invalid token")]
    InvalidSignature,
    #[error("token is not expired yet")]
    TooEarly,
    #[error(transparent)]
    Signing(#[from] SigningError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG.to_string(),
            typ: TYP.to_string(),
        }
    }
}

/// Decoded payload of a signed token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Same subject, new validity window. The original value is left untouched.
    #[must_use]
    pub fn renewed(&self, issued_at: i64, expires_at: i64) -> Self {
        Self {
            username: self.username.clone(),
            iat: issued_at,
            exp: expires_at,
        }
    }

    /// Seconds left until expiry; negative once expired.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.exp - now.timestamp()
    }
}

/// Token handed back to the client.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires: DateTime<Utc>,
}

pub struct TokenSigner {
    secret: SecretString,
    lifetime_seconds: i64,
    refresh_window_seconds: i64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("lifetime_seconds", &self.lifetime_seconds)
            .field("refresh_window_seconds", &self.refresh_window_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// # Errors
    /// `MissingSecret` for an empty secret, `InvalidLifetime` outside
    /// `1..=MAX_TTL_SECONDS`, `InvalidWindow` unless
    /// `0 < refresh_window_seconds < lifetime_seconds`.
    pub fn new(
        secret: SecretString,
        lifetime_seconds: i64,
        refresh_window_seconds: i64,
    ) -> Result<Self, SigningError> {
        if secret.expose_secret().is_empty() {
            return Err(SigningError::MissingSecret);
        }
        if !(1..=MAX_TTL_SECONDS).contains(&lifetime_seconds) {
            return Err(SigningError::InvalidLifetime);
        }
        if refresh_window_seconds <= 0 || refresh_window_seconds >= lifetime_seconds {
            return Err(SigningError::InvalidWindow);
        }
        Ok(Self {
            secret,
            lifetime_seconds,
            refresh_window_seconds,
        })
    }

    #[must_use]
    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime_seconds
    }

    #[must_use]
    pub fn refresh_window_seconds(&self) -> i64 {
        self.refresh_window_seconds
    }

    /// Issue a token for `username` valid for one lifetime from `now`.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded or signed.
    #[instrument(skip(self))]
    pub fn issue_initial(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, SigningError> {
        let issued_at = now.timestamp();
        let claims = Claims {
            username: username.to_string(),
            iat: issued_at,
            exp: issued_at + self.lifetime_seconds,
        };
        self.sign(&claims)
    }

    /// Check structure and signature, returning the decoded claims.
    ///
    /// Expiry is not checked here.
    ///
    /// # Errors
    /// `InvalidSignature` for any malformed or mis-signed token.
    pub fn verify(&self, token: &str) -> Result<Claims, RefreshError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(RefreshError::InvalidSignature);
        };

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != ALG {
            return Err(RefreshError::InvalidSignature);
        }

        let signature =
            Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| RefreshError::InvalidSignature)?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| RefreshError::InvalidSignature)?;

        b64d_json(claims_b64)
    }

    /// Renew a token that is close to, or past, its expiry.
    ///
    /// # Errors
    /// `InvalidSignature` for a bad token, `TooEarly` when more than the
    /// refresh window remains, `Signing` if the new token cannot be produced.
    #[instrument(skip(self, presented))]
    pub fn refresh(&self, presented: &str, now: DateTime<Utc>) -> Result<IssuedToken, RefreshError> {
        let claims = self.verify(presented)?;

        let remaining = claims.remaining_seconds(now);
        if remaining > self.refresh_window_seconds {
            debug!(remaining, "refresh requested too early");
            return Err(RefreshError::TooEarly);
        }

        let issued_at = now.timestamp();
        let renewed = claims.renewed(issued_at, issued_at + self.lifetime_seconds);
        Ok(self.sign(&renewed)?)
    }

    fn sign(&self, claims: &Claims) -> Result<IssuedToken, SigningError> {
        let expires = DateTime::from_timestamp(claims.exp, 0).ok_or(SigningError::Timestamp)?;

        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(IssuedToken {
            token: format!("{signing_input}.{signature_b64}"),
            expires,
        })
    }

    fn mac(&self) -> Result<HmacSha256, SigningError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SigningError::Key)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, SigningError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, RefreshError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| RefreshError::InvalidSignature)?;
    serde_json::from_slice(&bytes).map_err(|_| RefreshError::InvalidSignature)
}
