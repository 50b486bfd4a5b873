//! Auth handlers and supporting modules.
//!
//! This module coordinates credential verification, cookie sessions, the
//! session gate for protected routes, and the signed-token refresh protocol.
//!
//! ## Two credentials
//!
//! The session cookie and the signed token are independent. The gate only
//! looks at the session; `/refresh` only looks at the token. Signing out ends
//! the session but does not revoke tokens already handed out, which simply run
//! out on their own.
//!
//! ## Signing secret
//!
//! The HS256 secret is passed in once at startup. Rotating it invalidates every
//! outstanding token; sessions are unaffected.

pub(crate) mod credentials;
mod error;
pub(crate) mod gate;
pub(crate) mod refresh;
pub(crate) mod session;
pub(crate) mod signin;
pub(crate) mod signout;
mod state;
mod storage;
pub(crate) mod token;
pub(crate) mod types;
mod utils;

pub use credentials::{
    Authorized, CredentialStore, CredentialVerifier, MemoryCredentialStore, VerifyError,
    password_digest,
};
pub use error::AuthError;
pub use gate::require_session;
pub use session::{MemorySessionStore, SessionManager, SessionRecord, SessionStore};
pub use state::{AuthConfig, AuthState};
pub use storage::{PgCredentialStore, PgSessionStore};
pub use token::{Claims, IssuedToken, MAX_TTL_SECONDS, RefreshError, SigningError, TokenSigner};
pub(crate) use utils::valid_username;

#[cfg(test)]
mod tests;
