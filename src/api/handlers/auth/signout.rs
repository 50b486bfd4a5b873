//! `POST /signout`: drop the session and its cookie.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    error::AuthError,
    state::AuthState,
    types::{ErrorResponse, MessageResponse},
};

#[utoipa::path(
    post,
    path = "/signout",
    responses(
        (status = 200, description = "Session cleared", body = MessageResponse),
        (status = 500, description = "Session store unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn sign_out(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, AuthError> {
    let sessions = auth_state.sessions();
    sessions.clear(&headers).await.map_err(AuthError::Internal)?;

    let mut response_headers = HeaderMap::new();
    let cookie = sessions
        .clear_cookie()
        .map_err(|err| AuthError::Internal(err.into()))?;
    response_headers.insert(SET_COOKIE, cookie);

    info!("user signed out");

    Ok((
        StatusCode::OK,
        response_headers,
        Json(MessageResponse {
            message: "Signed out...".to_string(),
        }),
    ))
}
