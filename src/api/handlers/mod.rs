//! API handlers for the recipes service.
//!
//! `auth` owns sign-in, token refresh, sign-out, and the session gate;
//! `recipes` holds the protected collection; `health` reports build and
//! database status.

pub mod auth;
pub mod health;
pub mod recipes;
