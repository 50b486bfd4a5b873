//! `POST /refresh`: renew a signed token that is about to expire.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    error::AuthError,
    state::AuthState,
    token::IssuedToken,
    types::ErrorResponse,
    utils::extract_authorization_token,
};

#[utoipa::path(
    post,
    path = "/refresh",
    params(
        ("Authorization" = String, Header, description = "Signed token, optionally prefixed with `Bearer`")
    ),
    responses(
        (status = 200, description = "Token renewed", body = IssuedToken),
        (status = 400, description = "Token is not expired yet", body = ErrorResponse),
        (status = 401, description = "Missing, malformed, or mis-signed token", body = ErrorResponse),
        (status = 500, description = "Token could not be signed", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, AuthError> {
    let presented = extract_authorization_token(&headers).ok_or(AuthError::InvalidToken)?;

    let issued = auth_state.signer().refresh(&presented, Utc::now())?;
    debug!(expires = %issued.expires, "token refreshed");

    Ok((StatusCode::OK, Json(issued)))
}
