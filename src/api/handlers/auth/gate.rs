//! Session gate for protected routes.
//!
//! Flow Overview: read the session cookie, resolve it through the session
//! store, and either hand the request to the next service with the resolved
//! `SessionRecord` in its extensions, or answer immediately. A rejected request
//! never reaches the wrapped handler.

use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{error::AuthError, state::AuthState};

/// Middleware for `axum::middleware::from_fn`.
pub async fn require_session(
    Extension(auth_state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_state.sessions().current(request.headers()).await {
        Ok(Some(record)) => {
            debug!(username = %record.username, "session accepted");
            request.extensions_mut().insert(record);
            next.run(request).await
        }
        Ok(None) => {
            warn!(path = %request.uri().path(), "request without session rejected");
            AuthError::SessionAbsent.into_response()
        }
        Err(err) => AuthError::Internal(err).into_response(),
    }
}
