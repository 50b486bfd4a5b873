//! # Recipes
//!
//! `recipes` serves a small recipes API and guards it with two independent
//! credentials:
//!
//! - **Session cookie:** `POST /signin` verifies a username and password
//!   against the credential store and issues an opaque session token. Only the
//!   SHA-256 hash of the token is stored server side; the raw value travels in
//!   the `recipes_session` cookie. Every `/recipes` route sits behind a gate
//!   that answers `403` when no live session is attached to the request.
//! - **Signed token:** sign-in also returns a short-lived HS256 token. Clients
//!   renew it through `POST /refresh`, which only accepts tokens that are
//!   close to (or past) their expiry. Tokens are never stored.
//!
//! Credential records are created with `recipes provision` and are never
//! changed through the HTTP API.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
